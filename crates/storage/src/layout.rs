use crate::error::Result;
use crate::path::validate_name;
use std::path::{Path, PathBuf};

/// Default subdirectory for raw ebook files.
pub const DEFAULT_EBOOK_DIR: &str = "ebook";
/// Default subdirectory for extracted cover images.
pub const DEFAULT_COVER_DIR: &str = "cover";

/// Where ingested files live: a root directory with one subdirectory for raw
/// ebook files and one for cover images.
///
/// Nothing is created on construction; see
/// [`Storage::ensure_layout`](crate::Storage::ensure_layout).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageLayout {
    root: PathBuf,
    ebook: PathBuf,
    cover: PathBuf,
}
impl StorageLayout {
    /// Layout with the default `ebook/` and `cover/` subdirectories.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            ebook: root.join(DEFAULT_EBOOK_DIR),
            cover: root.join(DEFAULT_COVER_DIR),
            root,
        }
    }

    /// Layout with custom subdirectory names.
    ///
    /// Both names must be single path components (see [`validate_name`]) so
    /// that neither directory can sit outside `root`.
    pub fn with_dirs(root: impl Into<PathBuf>, ebook_dir: impl AsRef<Path>, cover_dir: impl AsRef<Path>) -> Result<Self> {
        let root = root.into();
        Ok(Self {
            ebook: root.join(validate_name(ebook_dir)?),
            cover: root.join(validate_name(cover_dir)?),
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ebook_dir(&self) -> &Path {
        &self.ebook
    }

    pub fn cover_dir(&self) -> &Path {
        &self.cover
    }

    /// Full path of a stored ebook file.
    pub fn ebook_path(&self, name: impl AsRef<Path>) -> Result<PathBuf> {
        Ok(self.ebook.join(validate_name(name)?))
    }

    /// Full path of a stored cover image.
    pub fn cover_path(&self, name: impl AsRef<Path>) -> Result<PathBuf> {
        Ok(self.cover.join(validate_name(name)?))
    }

    /// Returns `true` if `path` is directly inside the ebook or cover directory.
    pub fn contains(&self, path: &Path) -> bool {
        path.parent().is_some_and(|parent| parent == self.ebook || parent == self.cover)
            && path.file_name().is_some_and(|name| validate_name(name).is_ok())
    }
}
