use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};

/// Sentinel cover value used when a book has no usable embedded cover.
pub const DEFAULT_COVER: &str = "default_cover.jpg";
/// Sentinel author used when a book declares no authors.
pub const UNKNOWN_AUTHOR: &str = "unknown author";

/// Values substituted when a container lacks the real thing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholders {
    /// Recorded as the cover when there is no extracted cover image.
    pub default_cover: String,
    /// Recorded as the author when no author is declared.
    pub unknown_author: String,
}
impl Default for Placeholders {
    fn default() -> Self {
        Self {
            default_cover: DEFAULT_COVER.to_string(),
            unknown_author: UNKNOWN_AUTHOR.to_string(),
        }
    }
}

/// Where a book's cover lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cover {
    /// Extracted from the container and written to the cover directory.
    Extracted(PathBuf),
    /// No usable embedded cover; the configured sentinel value.
    Placeholder(String),
}
impl Cover {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder(_))
    }

    /// Path of the extracted cover image, if there is one.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Extracted(path) => Some(path),
            Self::Placeholder(_) => None,
        }
    }
}

impl Display for Cover {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Extracted(path) => write!(f, "{}", path.display()),
            Self::Placeholder(sentinel) => f.write_str(sentinel),
        }
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Cover {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Everything learned about one ingested book.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ExtractedMetadata {
    /// Declared title, or the file name stem.
    pub title: String,
    /// Declared authors joined by `", "`, or the unknown-author sentinel.
    pub author: String,
    /// Where the raw ebook bytes were stored.
    pub file_path: PathBuf,
    /// The extracted cover image, or the default-cover sentinel.
    #[cfg_attr(feature = "serde", serde(rename = "coverPath"))]
    pub cover: Cover,
    /// File name as uploaded.
    pub original_filename: String,
    /// Display name of the processor that handled the upload.
    pub format: String,
    /// Size of the stored file in bytes.
    pub file_size: u64,
    /// BLAKE3 hex digest of the stored file.
    pub file_hash: String,
}
impl ExtractedMetadata {
    /// Flatten into the string mapping that catalog records are built from.
    pub fn to_map(&self) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            ("title", self.title.clone()),
            ("author", self.author.clone()),
            ("filePath", self.file_path.display().to_string()),
            ("coverPath", self.cover.to_string()),
            ("originalFilename", self.original_filename.clone()),
            ("format", self.format.clone()),
            ("fileSize", self.file_size.to_string()),
            ("fileHash", self.file_hash.clone()),
        ])
    }
}
