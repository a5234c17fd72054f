//! Filesystem trait and implementations.
//!
//! This module defines the [`Filesystem`] trait: the narrow set of operations
//! the ingestion pipeline needs from durable storage. Every operation is
//! blocking; callers in async contexts are expected to run them inside
//! [`spawn_blocking`](https://docs.rs/tokio/latest/tokio/task/fn.spawn_blocking.html).

#[cfg(feature = "mock")]
mod faulty;
mod local;

#[cfg(feature = "mock")]
pub use self::faulty::{FaultyFilesystem, Operation};
pub use self::local::LocalFilesystem;
use crate::error::{ErrorKind, Result};
use std::io::{self, Read, Write};
use std::path::Path;

pub type BoxSyncRead = Box<dyn Read + Send + 'static>;
pub type BoxSyncWrite = Box<dyn Write + Send + 'static>;

/// Unified interface for the durable storage that ebooks and covers land on.
///
/// Paths are absolute (or relative to the process working directory); the
/// [`StorageLayout`](crate::StorageLayout) is responsible for building them
/// from validated names so that nothing escapes the storage root.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use bindery_storage::{backend::Filesystem, error::Result};
///
/// fn size_of(fs: &dyn Filesystem, path: &Path) -> Result<u64> {
///     let mut reader = fs.reader(path)?;
///     let mut sink = std::io::sink();
///     Ok(std::io::copy(&mut reader, &mut sink).unwrap_or(0))
/// }
/// ```
pub trait Filesystem: Send + Sync {
    /// Check whether `path` exists *and* is a directory.
    fn dir_exists(&self, path: &Path) -> Result<bool>;

    /// Check whether anything exists at `path`.
    fn exists(&self, path: &Path) -> Result<bool>;

    /// Create a directory and all of its missing parents.
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Open a file for streaming reads.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    fn reader(&self, path: &Path) -> Result<BoxSyncRead>;

    /// Create a new file for streaming writes.
    ///
    /// Returns [`AlreadyExists`](crate::error::ErrorKind::AlreadyExists) if
    /// anything is already at `path`; existing files are never truncated.
    ///
    /// # Notes
    /// - Callers should call `flush()` before dropping to ensure data is
    ///   written and errors are propagated.
    fn writer(&self, path: &Path) -> Result<BoxSyncWrite>;

    /// Delete a file.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    fn delete(&self, path: &Path) -> Result<()>;

    /// Copy everything from `source` into a new file at `path`,
    /// returning the number of bytes written.
    fn copy(&self, source: &mut dyn Read, path: &Path) -> Result<u64> {
        let mut writer = self.writer(path)?;
        let written = io::copy(source, &mut writer).map_err(ErrorKind::Io)?;
        writer.flush().map_err(ErrorKind::Io)?;
        Ok(written)
    }

    /// Write `data` to a new file at `path`.
    fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let mut writer = self.writer(path)?;
        writer.write_all(data).map_err(ErrorKind::Io)?;
        writer.flush().map_err(ErrorKind::Io)?;
        Ok(())
    }
}
