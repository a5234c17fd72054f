//! Fault-injecting filesystem for testing.
//!
//! Wraps another implementation and fails the selected operations, so tests
//! can drive the error paths (failed cover writes, failed rollbacks) that a
//! healthy disk never exercises.

use crate::FilesystemHandle;
use crate::backend::{BoxSyncRead, BoxSyncWrite, Filesystem};
use crate::error::{ErrorKind, Result};
use std::collections::HashSet;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::io::{Error as IoError, Read};
use std::path::Path;

/// An operation of the [`Filesystem`] trait that can be made to fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    DirExists,
    Exists,
    CreateDir,
    Reader,
    Writer,
    Copy,
    Write,
    Delete,
}
impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{self:?}")
    }
}

/// Filesystem decorator that fails chosen operations with an I/O error and
/// passes everything else through to the wrapped implementation.
///
/// # Examples
///
/// ```
/// use bindery_storage::backend::{FaultyFilesystem, Filesystem, LocalFilesystem, Operation};
/// use std::sync::Arc;
///
/// let fs = FaultyFilesystem::new(Arc::new(LocalFilesystem::new())).failing(Operation::Delete);
/// assert!(fs.delete(std::path::Path::new("/tmp/anything")).is_err());
/// ```
#[derive(Clone)]
pub struct FaultyFilesystem {
    inner: FilesystemHandle,
    failing: HashSet<Operation>,
}
impl FaultyFilesystem {
    pub fn new(inner: FilesystemHandle) -> Self {
        Self { inner, failing: HashSet::new() }
    }

    /// Make `operation` fail on every call.
    pub fn failing(mut self, operation: Operation) -> Self {
        self.failing.insert(operation);
        self
    }

    fn check(&self, operation: Operation, path: &Path) -> Result<()> {
        if self.failing.contains(&operation) {
            tracing::debug!(path = %path.display(), %operation, "Injecting filesystem failure");
            exn::bail!(ErrorKind::Io(IoError::other(format!("injected {operation} failure"))));
        }
        Ok(())
    }
}

impl Filesystem for FaultyFilesystem {
    fn dir_exists(&self, path: &Path) -> Result<bool> {
        self.check(Operation::DirExists, path)?;
        self.inner.dir_exists(path)
    }

    fn exists(&self, path: &Path) -> Result<bool> {
        self.check(Operation::Exists, path)?;
        self.inner.exists(path)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.check(Operation::CreateDir, path)?;
        self.inner.create_dir_all(path)
    }

    fn reader(&self, path: &Path) -> Result<BoxSyncRead> {
        self.check(Operation::Reader, path)?;
        self.inner.reader(path)
    }

    fn writer(&self, path: &Path) -> Result<BoxSyncWrite> {
        self.check(Operation::Writer, path)?;
        self.inner.writer(path)
    }

    fn delete(&self, path: &Path) -> Result<()> {
        self.check(Operation::Delete, path)?;
        self.inner.delete(path)
    }

    fn copy(&self, source: &mut dyn Read, path: &Path) -> Result<u64> {
        self.check(Operation::Copy, path)?;
        self.inner.copy(source, path)
    }

    fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        self.check(Operation::Write, path)?;
        self.inner.write(path, data)
    }
}
