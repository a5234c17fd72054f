//! Local filesystem backend.
//!
//! Thin wrapper over `std::fs` that maps I/O errors onto the crate's
//! actionable [`ErrorKind`]s.

use crate::backend::{BoxSyncRead, BoxSyncWrite, Filesystem};
use crate::error::{ErrorKind, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Local filesystem storage.
///
/// # Examples
///
/// ```no_run
/// use bindery_storage::backend::{Filesystem, LocalFilesystem};
/// use std::path::Path;
///
/// # fn example() -> bindery_storage::error::Result<()> {
/// let fs = LocalFilesystem::new();
/// fs.create_dir_all(Path::new("/srv/bindery/ebook"))?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalFilesystem;
impl LocalFilesystem {
    pub fn new() -> Self {
        Self
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
            std::io::ErrorKind::AlreadyExists => ErrorKind::AlreadyExists(path.to_path_buf()),
            _ => ErrorKind::Io(e),
        }
    }
}

impl Filesystem for LocalFilesystem {
    fn dir_exists(&self, path: &Path) -> Result<bool> {
        match fs::metadata(path) {
            Ok(metadata) => Ok(metadata.is_dir()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Self::map_io_error(e, path).into()),
        }
    }

    fn exists(&self, path: &Path) -> Result<bool> {
        Ok(fs::exists(path).map_err(|e| Self::map_io_error(e, path))?)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        Ok(fs::create_dir_all(path).map_err(|e| Self::map_io_error(e, path))?)
    }

    fn reader(&self, path: &Path) -> Result<BoxSyncRead> {
        let file = File::open(path).map_err(|e| Self::map_io_error(e, path))?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn writer(&self, path: &Path) -> Result<BoxSyncWrite> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| Self::map_io_error(e, path))?;
        Ok(Box::new(BufWriter::new(file)))
    }

    fn delete(&self, path: &Path) -> Result<()> {
        Ok(fs::remove_file(path).map_err(|e| Self::map_io_error(e, path))?)
    }
}
