use crate::error::{ErrorKind, Result};
use crate::layout::StorageLayout;
use crate::staged::StagedFile;
use crate::{FilesystemHandle, backend::LocalFilesystem};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// How many random names to try before giving up on finding a free one.
/// UUIDv4 collisions are astronomically unlikely; hitting this limit means
/// something is wrong with the directory (or the random source).
pub const MAX_NAME_ATTEMPTS: usize = 8;

/// A file written through [`Storage`], still guarded against rollback.
pub struct StoredFile {
    pub file: StagedFile,
    /// Bytes written.
    pub size: u64,
    /// BLAKE3 hex digest of the bytes written.
    pub hash: String,
}

/// Durable storage for ingested books: a [`Filesystem`](crate::Filesystem)
/// handle plus the [`StorageLayout`] that says where things go.
///
/// Cheap to clone; the filesystem handle is reference counted.
#[derive(Clone)]
pub struct Storage {
    fs: FilesystemHandle,
    layout: StorageLayout,
}
impl Storage {
    pub fn new(fs: FilesystemHandle, layout: StorageLayout) -> Self {
        Self { fs, layout }
    }

    /// Storage on the local filesystem.
    pub fn local(layout: StorageLayout) -> Self {
        Self::new(Arc::new(LocalFilesystem::new()), layout)
    }

    pub fn fs(&self) -> &FilesystemHandle {
        &self.fs
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Create the root, ebook and cover directories if they are missing.
    #[instrument(level = "debug", skip(self), fields(root = %self.layout.root().display()))]
    pub fn ensure_layout(&self) -> Result<()> {
        for dir in [self.layout.root(), self.layout.ebook_dir(), self.layout.cover_dir()] {
            if !self.fs.dir_exists(dir)? {
                tracing::debug!(dir = %dir.display(), "Creating storage directory");
                self.fs.create_dir_all(dir)?;
            }
        }
        Ok(())
    }

    /// Generate a name for a new ebook file: a random UUID followed by
    /// `extension`. Never returns a name already present in the ebook
    /// directory.
    pub fn unique_name(&self, extension: &str) -> Result<String> {
        self.free_name(self.layout.ebook_dir(), |id| format!("{id}.{extension}"))
    }

    /// Generate a name for a user-supplied cover image, `cover_<uuid>.<extension>`.
    pub fn unique_cover_name(&self, extension: &str) -> Result<String> {
        self.free_name(self.layout.cover_dir(), |id| format!("cover_{id}.{extension}"))
    }

    fn free_name(&self, dir: &Path, make: impl Fn(Uuid) -> String) -> Result<String> {
        for _ in 0..MAX_NAME_ATTEMPTS {
            let name = make(Uuid::new_v4());
            if !self.fs.exists(&dir.join(crate::validate_name(&name)?))? {
                return Ok(name);
            }
            tracing::warn!(dir = %dir.display(), name, "Generated file name already taken, retrying");
        }
        exn::bail!(ErrorKind::NamesExhausted(dir.to_path_buf()))
    }

    /// Write `source` verbatim to `ebook/<name>`.
    ///
    /// The returned file is guarded from the moment the write starts, so a
    /// failed or interrupted copy leaves nothing behind.
    #[instrument(level = "debug", skip(self, source))]
    pub fn store_ebook(&self, name: &str, source: &mut dyn Read) -> Result<StoredFile> {
        self.store_stream(self.layout.ebook_path(name)?, source)
    }

    /// Write `source` verbatim to `cover/<name>`.
    #[instrument(level = "debug", skip(self, source))]
    pub fn store_cover_stream(&self, name: &str, source: &mut dyn Read) -> Result<StoredFile> {
        self.store_stream(self.layout.cover_path(name)?, source)
    }

    /// Write cover image bytes to `cover/<name>`.
    #[instrument(level = "debug", skip(self, data), fields(bytes = data.len()))]
    pub fn store_cover(&self, name: &str, data: &[u8]) -> Result<StagedFile> {
        let file = StagedFile::new(self.fs.clone(), self.layout.cover_path(name)?);
        let result = self.fs.write(file.path(), data);
        guarded(file, result).map(|(file, ())| file)
    }

    fn store_stream(&self, path: PathBuf, source: &mut dyn Read) -> Result<StoredFile> {
        let file = StagedFile::new(self.fs.clone(), path);
        let mut source = HashingReader::new(source);
        let result = self.fs.copy(&mut source, file.path());
        let (file, size) = guarded(file, result)?;
        Ok(StoredFile {
            file,
            size,
            hash: source.finish(),
        })
    }

    /// Delete a previously stored ebook or cover.
    ///
    /// Only files directly inside the layout's ebook or cover directory can be
    /// removed. Returns `false` if the file was already gone.
    #[instrument(level = "debug", skip(self))]
    pub fn remove(&self, path: &Path) -> Result<bool> {
        if !self.layout.contains(path) {
            exn::bail!(ErrorKind::InvalidPath(path.to_path_buf()));
        }
        match self.fs.delete(path) {
            Ok(()) => Ok(true),
            Err(e) if matches!(&*e, ErrorKind::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Pair a write's outcome with its guard. Writes never replace existing
/// files, so when the name was already taken the file on disk belongs to
/// someone else and the guard is released without deleting it.
fn guarded<T>(file: StagedFile, result: Result<T>) -> Result<(StagedFile, T)> {
    match result {
        Ok(value) => Ok((file, value)),
        Err(e) => {
            if matches!(&*e, ErrorKind::AlreadyExists(_)) {
                file.commit();
            }
            Err(e)
        },
    }
}

/// Hashes everything read through it.
struct HashingReader<'a> {
    inner: &'a mut dyn Read,
    hasher: blake3::Hasher,
}
impl<'a> HashingReader<'a> {
    fn new(inner: &'a mut dyn Read) -> Self {
        Self {
            inner,
            hasher: blake3::Hasher::new(),
        }
    }

    fn finish(&self) -> String {
        self.hasher.finalize().to_string()
    }
}
impl Read for HashingReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.inner.read(buf)?;
        self.hasher.update(&buf[..read]);
        Ok(read)
    }
}
