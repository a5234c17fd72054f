use crate::error::{ErrorKind, Result};
use crate::upload::Upload;
use bindery_config::Config;
use bindery_extract::error::ErrorKind as ExtractErrorKind;
use bindery_extract::{ExtractedMetadata, FormatExtension, Placeholders, ProcessRequest, Registry, Staged};
use bindery_storage::error::ErrorKind as StorageErrorKind;
use bindery_storage::{MAX_NAME_ATTEMPTS, StagedFile, Storage};
use exn::{OptionExt, ResultExt};
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::instrument;

/// Turns uploads into stored books.
///
/// Each call is independent: the only thing concurrent ingestions share is
/// the storage namespace, and stored names are random UUIDs. Cloning is cheap.
#[derive(Clone)]
pub struct Ingestor {
    registry: Arc<Registry>,
    storage: Storage,
    placeholders: Arc<Placeholders>,
}
impl Ingestor {
    /// Local storage, every built-in format, and the configured placeholders.
    pub fn new(config: &Config) -> Result<Self> {
        let layout = config.layout().or_raise(|| ErrorKind::Config)?;
        Ok(Self::with_parts(
            Registry::with_defaults(),
            Storage::local(layout),
            config.placeholders(),
        ))
    }

    pub fn with_parts(registry: Registry, storage: Storage, placeholders: Placeholders) -> Self {
        Self {
            registry: Arc::new(registry),
            storage,
            placeholders: Arc::new(placeholders),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Ingest an upload on the blocking thread pool.
    ///
    /// If this future is dropped before it completes, any files the
    /// ingestion has written are removed once the worker finishes.
    pub async fn ingest(&self, upload: Upload) -> Result<ExtractedMetadata> {
        Ok(self.blocking(move |this| this.stage(upload)).await?.commit())
    }

    /// [`ingest`](Self::ingest) for callers that are already on a thread
    /// that may block.
    pub fn ingest_blocking(&self, upload: Upload) -> Result<ExtractedMetadata> {
        Ok(self.stage(upload)?.commit())
    }

    /// Store a user-supplied cover image as `cover_<uuid>.<extension>`.
    pub async fn store_cover(&self, upload: Upload) -> Result<PathBuf> {
        Ok(self.blocking(move |this| this.stage_cover(upload)).await?.commit())
    }

    /// Remove the files of a finished ingestion: the ebook, and the cover if
    /// one was extracted.
    ///
    /// Files that are already gone are not an error. Both deletions are
    /// attempted even if the first fails.
    pub async fn discard(&self, metadata: &ExtractedMetadata) -> Result<()> {
        let metadata = metadata.clone();
        self.blocking(move |this| this.discard_blocking(&metadata)).await
    }

    pub fn discard_blocking(&self, metadata: &ExtractedMetadata) -> Result<()> {
        let mut failure = None;
        for path in std::iter::once(metadata.file_path.as_path()).chain(metadata.cover.path()) {
            match self.storage.remove(path) {
                Ok(removed) => tracing::debug!(path = %path.display(), removed, "Discarded file"),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "Failed to discard file");
                    failure.get_or_insert(err);
                },
            }
        }
        match failure {
            Some(err) => Err(err.raise(ErrorKind::StorageFailed)),
            None => Ok(()),
        }
    }

    async fn blocking<T, F>(&self, task: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Self) -> Result<T> + Send + 'static,
    {
        let this = self.clone();
        tokio::task::spawn_blocking(move || task(&this)).await.or_raise(|| ErrorKind::Interrupted)?
    }

    #[instrument(skip(self, upload), fields(filename = %upload.filename))]
    fn stage(&self, upload: Upload) -> Result<Staged<ExtractedMetadata>> {
        let Upload { filename, reader } = upload;
        let mut reader = non_empty(reader)?;
        let extension = FormatExtension::from_filename(&filename).or_raise(|| ErrorKind::MissingExtension)?;
        let processor = self
            .registry
            .resolve(extension.as_str())
            .ok_or_raise(|| ErrorKind::UnsupportedFormat(extension.to_string()))?;
        // Names are checked before use, but another writer can still claim
        // one first; the write then refuses it and a new name is drawn.
        let mut attempts = 1;
        let (unique_name, staged) = loop {
            let unique_name = self.storage.unique_name(extension.as_str()).or_raise(|| ErrorKind::StorageFailed)?;
            let request = ProcessRequest {
                original_filename: &filename,
                unique_name: &unique_name,
                placeholders: &self.placeholders,
            };
            match processor.process(&mut reader, &request, &self.storage) {
                Ok(staged) => break (unique_name, staged),
                Err(err) if matches!(&*err, ExtractErrorKind::NameTaken) && attempts < MAX_NAME_ATTEMPTS => {
                    tracing::warn!(unique_name, attempts, "Storage name was taken during the write, drawing another");
                    attempts += 1;
                },
                Err(err) => {
                    let kind = match &*err {
                        ExtractErrorKind::Storage | ExtractErrorKind::NameTaken => ErrorKind::StorageFailed,
                        _ => ErrorKind::ProcessingFailed(processor.name().to_string()),
                    };
                    return Err(err.raise(kind));
                },
            }
        };

        let metadata = staged.value();
        tracing::info!(
            unique_name,
            format = processor.name(),
            title = %metadata.title,
            author = %metadata.author,
            cover = !metadata.cover.is_placeholder(),
            "Ingested upload"
        );
        Ok(staged)
    }

    #[instrument(skip(self, upload), fields(filename = %upload.filename))]
    fn stage_cover(&self, upload: Upload) -> Result<StagedFile> {
        let Upload { filename, reader } = upload;
        let mut reader = non_empty(reader)?;
        let extension = FormatExtension::from_filename(&filename).or_raise(|| ErrorKind::MissingExtension)?;
        self.storage.ensure_layout().or_raise(|| ErrorKind::StorageFailed)?;
        let mut attempts = 1;
        let (name, stored) = loop {
            let name = self.storage.unique_cover_name(extension.as_str()).or_raise(|| ErrorKind::StorageFailed)?;
            match self.storage.store_cover_stream(&name, &mut reader) {
                Ok(stored) => break (name, stored),
                Err(err) if matches!(&*err, StorageErrorKind::AlreadyExists(_)) && attempts < MAX_NAME_ATTEMPTS => {
                    tracing::warn!(name, attempts, "Cover name was taken during the write, drawing another");
                    attempts += 1;
                },
                Err(err) => return Err(err.raise(ErrorKind::StorageFailed)),
            }
        };
        tracing::info!(name, bytes = stored.size, "Stored uploaded cover");
        Ok(stored.file)
    }
}

/// Peek at the upload without consuming it, rejecting empty ones.
fn non_empty(reader: Box<dyn Read + Send>) -> Result<BufReader<Box<dyn Read + Send>>> {
    let mut reader = BufReader::new(reader);
    if reader.fill_buf().or_raise(|| ErrorKind::StorageFailed)?.is_empty() {
        exn::bail!(ErrorKind::EmptyUpload);
    }
    Ok(reader)
}
