//! Rollback guards for freshly written files.

use crate::FilesystemHandle;
use crate::error::{ErrorKind, Result};
use std::ops::Deref;
use std::path::{Path, PathBuf};

/// A file that has been written but not yet accepted.
///
/// The guard deletes its file when dropped unless [`commit`](Self::commit) was
/// called first, so every exit path that does not explicitly accept the file
/// (an early `?`, a panic, a dropped future holding it) leaves no residue.
/// Failures to delete on drop are logged, never raised.
#[must_use = "dropping a StagedFile deletes the file it guards"]
pub struct StagedFile {
    fs: FilesystemHandle,
    path: PathBuf,
    armed: bool,
}
impl StagedFile {
    /// Start guarding `path`. Register the guard as soon as the file exists.
    pub fn new(fs: FilesystemHandle, path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            path: path.into(),
            armed: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accept the file: it will outlive the guard.
    pub fn commit(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }

    /// Delete the file now, reporting the outcome instead of logging it.
    ///
    /// A file that has already disappeared counts as rolled back.
    pub fn rollback(mut self) -> Result<()> {
        self.armed = false;
        match self.fs.delete(&self.path) {
            Err(e) if !matches!(e.deref(), ErrorKind::NotFound(_)) => Err(e),
            _ => Ok(()),
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match self.fs.delete(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Rolled back uncommitted file"),
            Err(e) if matches!(e.deref(), ErrorKind::NotFound(_)) => {},
            Err(e) => tracing::warn!(path = %self.path.display(), error = %e, "Failed to roll back uncommitted file"),
        }
    }
}
