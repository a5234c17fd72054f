//! The format processor contract and the shared parse-and-persist pipeline.

use crate::error::{ErrorKind, Result};
use crate::extension::title_from_filename;
use crate::models::{Author, Cover, ExtractedMetadata, Placeholders, format_authors};
use bindery_storage::error::ErrorKind as StorageErrorKind;
use bindery_storage::{StagedFile, Storage};
use exn::ResultExt;
use std::io::Read;
use std::path::Path;
use tracing::instrument;

/// What a processor learned from a stored container.
#[derive(Debug)]
pub struct ParsedBook {
    /// Declared title, if any.
    pub title: Option<String>,
    /// Declared authors, in document order.
    pub authors: Vec<Author>,
    /// The embedded cover image. Kept as a `Result` so that a broken cover
    /// never fails the parse as a whole.
    pub cover: Result<Option<Vec<u8>>>,
}

/// Per-upload inputs to [`FormatProcessor::process`].
#[derive(Debug, Clone, Copy)]
pub struct ProcessRequest<'a> {
    /// File name as uploaded; used for the title fallback.
    pub original_filename: &'a str,
    /// Collision-free name to store the ebook under.
    pub unique_name: &'a str,
    pub placeholders: &'a Placeholders,
}

/// A result whose files are still on probation.
///
/// Dropping a `Staged` value deletes every file it holds, so the files only
/// survive if whoever ends up with the value calls [`commit`](Self::commit).
#[must_use = "dropping a Staged value deletes the files it holds"]
pub struct Staged<T> {
    value: T,
    files: Vec<StagedFile>,
}
impl<T> Staged<T> {
    pub fn new(value: T, files: Vec<StagedFile>) -> Self {
        Self { value, files }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn files(&self) -> &[StagedFile] {
        &self.files
    }

    /// Keep the files and hand back the value.
    pub fn commit(self) -> T {
        for file in self.files {
            file.commit();
        }
        self.value
    }
}

/// Parses and persists one container format.
///
/// Implementations only need to declare their extensions and know how to
/// [`parse`](Self::parse) a stored file; storage, fallbacks, cover handling
/// and rollback are shared by the provided [`process`](Self::process).
///
/// Processors hold no per-call state and are shared between concurrent
/// ingestions.
pub trait FormatProcessor: Send + Sync {
    /// Short display name, e.g. `"EPUB"`.
    fn name(&self) -> &'static str;

    /// Lowercase extensions this processor handles.
    fn extensions(&self) -> &'static [&'static str];

    /// Case-insensitive capability check against [`extensions`](Self::extensions).
    fn supports(&self, extension: &str) -> bool {
        self.extensions().iter().any(|e| e.eq_ignore_ascii_case(extension))
    }

    /// Read the container stored at `path` and pull out its declared title,
    /// authors and cover.
    ///
    /// # Errors
    ///
    /// Fails if the file is not a well-formed container of this format.
    fn parse(&self, storage: &Storage, path: &Path) -> Result<ParsedBook>;

    /// Store `content` under `ebook/<unique_name>`, parse it, and return its
    /// metadata with the written files still staged.
    ///
    /// The raw bytes are persisted before parsing. If parsing fails they are
    /// deleted again and the parse error is returned. A missing or broken
    /// cover never fails the call; the cover sentinel is recorded instead.
    ///
    /// Existing files are never replaced: if `ebook/<unique_name>` is already
    /// taken this fails with [`ErrorKind::NameTaken`] before reading
    /// `content`, and the caller can retry under a fresh name.
    #[instrument(skip(self, content, request, storage), fields(format = self.name(), unique_name = request.unique_name))]
    fn process(&self, content: &mut dyn Read, request: &ProcessRequest<'_>, storage: &Storage) -> Result<Staged<ExtractedMetadata>> {
        storage.ensure_layout().or_raise(|| ErrorKind::Storage)?;
        let stored = storage.store_ebook(request.unique_name, content).map_err(|err| {
            let kind = match &*err {
                StorageErrorKind::AlreadyExists(_) => ErrorKind::NameTaken,
                _ => ErrorKind::Storage,
            };
            err.raise(kind)
        })?;

        let parsed = match self.parse(storage, stored.file.path()) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::debug!(error = %err, "Parse failed, rolling back stored file");
                if let Err(rollback) = stored.file.rollback() {
                    tracing::warn!(error = %rollback, "Failed to roll back stored file after parse failure");
                }
                return Err(err);
            },
        };

        let title = parsed
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| title_from_filename(request.original_filename));
        let author = format_authors(&parsed.authors, &request.placeholders.unknown_author);

        let mut files = Vec::with_capacity(2);
        let cover = match store_cover(parsed.cover, request.unique_name, storage) {
            Some(file) => {
                let cover = Cover::Extracted(file.path().to_path_buf());
                files.push(file);
                cover
            },
            None => Cover::Placeholder(request.placeholders.default_cover.clone()),
        };

        let metadata = ExtractedMetadata {
            title,
            author,
            file_path: stored.file.path().to_path_buf(),
            cover,
            original_filename: request.original_filename.to_string(),
            format: self.name().to_string(),
            file_size: stored.size,
            file_hash: stored.hash,
        };
        files.insert(0, stored.file);
        Ok(Staged::new(metadata, files))
    }
}

/// Name of the extracted cover for an ebook stored as `unique_name`.
pub fn cover_name(unique_name: &str) -> String {
    format!("cover_{unique_name}.jpg")
}

/// Best effort: any failure is logged and yields `None`.
fn store_cover(cover: Result<Option<Vec<u8>>>, unique_name: &str, storage: &Storage) -> Option<StagedFile> {
    let data = match cover {
        Ok(Some(data)) if !data.is_empty() => data,
        Ok(_) => {
            tracing::debug!("No embedded cover");
            return None;
        },
        Err(err) => {
            tracing::warn!(error = %err, "Unreadable embedded cover, using placeholder");
            return None;
        },
    };
    match storage.store_cover(&cover_name(unique_name), &data) {
        Ok(file) => Some(file),
        Err(err) => {
            tracing::warn!(error = %err, "Failed to store cover, using placeholder");
            None
        },
    }
}
