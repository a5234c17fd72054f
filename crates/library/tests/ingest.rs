use bindery_extract::error::ErrorKind as ExtractErrorKind;
use bindery_extract::{FormatProcessor, ParsedBook};
use bindery_library::error::ErrorKind;
use bindery_library::{Cover, Ingestor, Placeholders, Registry, Upload};
use bindery_storage::backend::{BoxSyncRead, BoxSyncWrite, FaultyFilesystem, Filesystem, LocalFilesystem, Operation};
use bindery_storage::{Storage, StorageLayout};
use rstest::rstest;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use std::time::Duration;

const FULL_EPUB: &[u8] = include_bytes!("../../extract/tests/fixtures/full.epub");
const MULTI_AUTHOR_EPUB: &[u8] = include_bytes!("../../extract/tests/fixtures/multi_author.epub");
const UNTITLED_EPUB: &[u8] = include_bytes!("../../extract/tests/fixtures/untitled.epub");
const ANONYMOUS_EPUB: &[u8] = include_bytes!("../../extract/tests/fixtures/anonymous.epub");
const FULL_FB2: &[u8] = include_bytes!("../../extract/tests/fixtures/full.fb2");
const CP1251_FB2: &[u8] = include_bytes!("../../extract/tests/fixtures/cp1251.fb2");

fn ingestor(root: &Path) -> Ingestor {
    Ingestor::with_parts(Registry::with_defaults(), Storage::local(StorageLayout::new(root)), Placeholders::default())
}

fn faulty_ingestor(root: &Path, operation: Operation) -> Ingestor {
    let fs = FaultyFilesystem::new(Arc::new(LocalFilesystem::new())).failing(operation);
    Ingestor::with_parts(
        Registry::with_defaults(),
        Storage::new(Arc::new(fs), StorageLayout::new(root)),
        Placeholders::default(),
    )
}

fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir(dir) {
        Ok(entries) => entries.map(|e| e.unwrap().file_name().to_string_lossy().into_owned()).collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}

#[tokio::test]
async fn test_declared_metadata_is_returned_verbatim() {
    let temp_dir = tempfile::tempdir().unwrap();
    let ingestor = ingestor(temp_dir.path());
    let metadata = ingestor.ingest(Upload::from_bytes("colour.epub", FULL_EPUB)).await.unwrap();

    assert_eq!(metadata.title, "The Colour of Magic");
    assert_eq!(metadata.author, "Terry Pratchett");
    assert_eq!(metadata.format, "EPUB");
    assert_eq!(metadata.original_filename, "colour.epub");
    assert_eq!(metadata.file_path.parent().unwrap(), temp_dir.path().join("ebook"));
    assert!(metadata.file_path.extension().is_some_and(|e| e == "epub"));

    // Stored bytes are exactly the upload.
    let stored = std::fs::read(&metadata.file_path).unwrap();
    assert_eq!(stored, FULL_EPUB);
    assert_eq!(metadata.file_size, FULL_EPUB.len() as u64);
    assert_eq!(metadata.file_hash, blake3::hash(FULL_EPUB).to_string());

    let unique_name = metadata.file_path.file_name().unwrap().to_str().unwrap();
    let cover = metadata.cover.path().unwrap();
    assert_eq!(cover, temp_dir.path().join("cover").join(format!("cover_{unique_name}.jpg")));
    assert!(std::fs::read(cover).unwrap().starts_with(&[0xFF, 0xD8, 0xFF]));
}

#[tokio::test]
async fn test_multiple_authors_are_joined() {
    let temp_dir = tempfile::tempdir().unwrap();
    let metadata = ingestor(temp_dir.path())
        .ingest(Upload::from_bytes("omens.epub", MULTI_AUTHOR_EPUB))
        .await
        .unwrap();
    assert_eq!(metadata.title, "Good Omens");
    assert_eq!(metadata.author, "Terry Pratchett, Neil Gaiman");
}

#[tokio::test]
async fn test_missing_title_falls_back_to_filename() {
    let temp_dir = tempfile::tempdir().unwrap();
    let metadata = ingestor(temp_dir.path())
        .ingest(Upload::from_bytes("My Untitled Novel.EPUB", UNTITLED_EPUB))
        .await
        .unwrap();
    assert_eq!(metadata.title, "My Untitled Novel");
    assert_eq!(metadata.author, "Jane Doe");
}

#[tokio::test]
async fn test_missing_author_and_cover_use_sentinels() {
    let temp_dir = tempfile::tempdir().unwrap();
    let metadata = ingestor(temp_dir.path())
        .ingest(Upload::from_bytes("beowulf.epub", ANONYMOUS_EPUB))
        .await
        .unwrap();
    assert_eq!(metadata.title, "Beowulf");
    assert_eq!(metadata.author, "unknown author");
    assert_eq!(metadata.cover, Cover::Placeholder("default_cover.jpg".into()));
    assert!(files_in(&temp_dir.path().join("cover")).is_empty());
}

#[tokio::test]
async fn test_configured_placeholders() {
    let temp_dir = tempfile::tempdir().unwrap();
    let placeholders = Placeholders {
        default_cover: "/static/blank.png".into(),
        unknown_author: "Anonymous".into(),
    };
    let ingestor = Ingestor::with_parts(Registry::with_defaults(), Storage::local(StorageLayout::new(temp_dir.path())), placeholders);
    let metadata = ingestor.ingest(Upload::from_bytes("beowulf.epub", ANONYMOUS_EPUB)).await.unwrap();
    assert_eq!(metadata.author, "Anonymous");
    assert_eq!(metadata.to_map()["coverPath"], "/static/blank.png");
}

#[tokio::test]
async fn test_fb2() {
    let temp_dir = tempfile::tempdir().unwrap();
    let metadata = ingestor(temp_dir.path()).ingest(Upload::from_bytes("master.fb2", FULL_FB2)).await.unwrap();
    assert_eq!(metadata.format, "FB2");
    assert_eq!(metadata.title, "The Master and Margarita");
    assert_eq!(metadata.author, "Mikhail Afanasyevich Bulgakov");
    assert!(!metadata.cover.is_placeholder());
}

#[tokio::test]
async fn test_fb2_in_declared_encoding() {
    let temp_dir = tempfile::tempdir().unwrap();
    let metadata = ingestor(temp_dir.path()).ingest(Upload::from_bytes("master.fb2", CP1251_FB2)).await.unwrap();
    assert_eq!(metadata.title, "Мастер и Маргарита");
    assert_eq!(metadata.author, "Михаил Афанасьевич Булгаков");
    assert_eq!(std::fs::read(&metadata.file_path).unwrap(), CP1251_FB2);
}

#[rstest]
#[case("book")]
#[case("book.")]
#[case(".epub")]
#[case("book.ep ub")]
#[tokio::test]
async fn test_missing_extension_writes_nothing(#[case] filename: &str) {
    let temp_dir = tempfile::tempdir().unwrap();
    let err = ingestor(temp_dir.path()).ingest(Upload::from_bytes(filename, FULL_EPUB)).await.unwrap_err();
    assert_eq!(*err, ErrorKind::MissingExtension);
    assert!(err.is_validation());
    assert!(files_in(temp_dir.path()).is_empty());
}

#[tokio::test]
async fn test_unsupported_format_writes_nothing() {
    let temp_dir = tempfile::tempdir().unwrap();
    let err = ingestor(temp_dir.path()).ingest(Upload::from_bytes("book.MOBI", FULL_EPUB)).await.unwrap_err();
    assert_eq!(*err, ErrorKind::UnsupportedFormat("mobi".into()));
    assert!(files_in(temp_dir.path()).is_empty());
}

#[tokio::test]
async fn test_empty_upload_writes_nothing() {
    let temp_dir = tempfile::tempdir().unwrap();
    let err = ingestor(temp_dir.path()).ingest(Upload::from_bytes("book.epub", Vec::new())).await.unwrap_err();
    assert_eq!(*err, ErrorKind::EmptyUpload);
    assert!(files_in(temp_dir.path()).is_empty());
}

#[rstest]
#[case("broken.epub", "EPUB", ExtractErrorKind::MalformedContainer("EPUB"))]
#[case("broken.fb2", "FB2", ExtractErrorKind::InvalidDocument("FB2"))]
#[tokio::test]
async fn test_corrupt_container_is_rolled_back(#[case] filename: &str, #[case] format: &str, #[case] cause: ExtractErrorKind) {
    let temp_dir = tempfile::tempdir().unwrap();
    let garbage: Vec<u8> = (0..4096u32).map(|i| (i.wrapping_mul(2_654_435_761) >> 13) as u8).collect();
    let err = ingestor(temp_dir.path()).ingest(Upload::from_bytes(filename, garbage)).await.unwrap_err();
    assert_eq!(*err, ErrorKind::ProcessingFailed(format.into()));
    // The parse error is kept as context.
    let causes: Vec<&ExtractErrorKind> = err
        .frame()
        .children()
        .iter()
        .filter_map(|child| child.error().downcast_ref::<ExtractErrorKind>())
        .collect();
    assert_eq!(causes, [&cause]);
    assert!(!err.is_retryable());
    assert!(files_in(&temp_dir.path().join("ebook")).is_empty());
    assert!(files_in(&temp_dir.path().join("cover")).is_empty());
}

#[tokio::test]
async fn test_failed_rollback_reports_original_error() {
    let temp_dir = tempfile::tempdir().unwrap();
    let ingestor = faulty_ingestor(temp_dir.path(), Operation::Delete);
    let err = ingestor.ingest(Upload::from_bytes("broken.epub", b"not a zip".to_vec())).await.unwrap_err();
    assert_eq!(*err, ErrorKind::ProcessingFailed("EPUB".into()));
}

#[tokio::test]
async fn test_failed_cover_write_still_succeeds() {
    let temp_dir = tempfile::tempdir().unwrap();
    let ingestor = faulty_ingestor(temp_dir.path(), Operation::Write);
    let metadata = ingestor.ingest(Upload::from_bytes("colour.epub", FULL_EPUB)).await.unwrap();
    assert!(metadata.cover.is_placeholder());
    assert!(metadata.file_path.exists());
}

#[tokio::test]
async fn test_storage_failure() {
    let temp_dir = tempfile::tempdir().unwrap();
    let ingestor = faulty_ingestor(temp_dir.path(), Operation::CreateDir);
    let err = ingestor.ingest(Upload::from_bytes("colour.epub", FULL_EPUB)).await.unwrap_err();
    assert_eq!(*err, ErrorKind::StorageFailed);
    assert!(err.is_retryable());
    assert!(!err.is_validation());
}

#[rstest]
#[case("colour.epub", FULL_EPUB)]
#[case("master.fb2", FULL_FB2)]
#[tokio::test]
async fn test_unreadable_stored_file(#[case] filename: &str, #[case] bytes: &'static [u8]) {
    let temp_dir = tempfile::tempdir().unwrap();
    let ingestor = faulty_ingestor(temp_dir.path(), Operation::Reader);
    let err = ingestor.ingest(Upload::from_bytes(filename, bytes)).await.unwrap_err();
    assert_eq!(*err, ErrorKind::StorageFailed);
    assert!(err.is_retryable());
    assert!(files_in(&temp_dir.path().join("ebook")).is_empty());
}

/// Local filesystem where another upload claims the first file the pipeline
/// is about to create, after the name was checked to be free.
#[derive(Default)]
struct Contended {
    inner: LocalFilesystem,
    claimed: Mutex<Option<PathBuf>>,
    done: AtomicBool,
}
impl Filesystem for Contended {
    fn dir_exists(&self, path: &Path) -> bindery_storage::error::Result<bool> {
        self.inner.dir_exists(path)
    }

    fn exists(&self, path: &Path) -> bindery_storage::error::Result<bool> {
        self.inner.exists(path)
    }

    fn create_dir_all(&self, path: &Path) -> bindery_storage::error::Result<()> {
        self.inner.create_dir_all(path)
    }

    fn reader(&self, path: &Path) -> bindery_storage::error::Result<BoxSyncRead> {
        self.inner.reader(path)
    }

    fn writer(&self, path: &Path) -> bindery_storage::error::Result<BoxSyncWrite> {
        if !self.done.swap(true, Ordering::SeqCst) {
            std::fs::write(path, b"another upload").unwrap();
            *self.claimed.lock().unwrap() = Some(path.to_path_buf());
        }
        self.inner.writer(path)
    }

    fn delete(&self, path: &Path) -> bindery_storage::error::Result<()> {
        self.inner.delete(path)
    }
}

#[tokio::test]
async fn test_name_claimed_during_write_is_redrawn() {
    let temp_dir = tempfile::tempdir().unwrap();
    let fs = Arc::new(Contended::default());
    let storage = Storage::new(fs.clone(), StorageLayout::new(temp_dir.path()));
    let ingestor = Ingestor::with_parts(Registry::with_defaults(), storage, Placeholders::default());

    let metadata = ingestor.ingest(Upload::from_bytes("colour.epub", FULL_EPUB)).await.unwrap();
    let claimed = fs.claimed.lock().unwrap().clone().unwrap();
    assert_ne!(metadata.file_path, claimed);
    assert_eq!(std::fs::read(&claimed).unwrap(), b"another upload");
    assert_eq!(std::fs::read(&metadata.file_path).unwrap(), FULL_EPUB);
    assert_eq!(metadata.title, "The Colour of Magic");
    assert_eq!(files_in(&temp_dir.path().join("ebook")).len(), 2);
}

#[tokio::test]
async fn test_cover_name_claimed_during_write_is_redrawn() {
    let temp_dir = tempfile::tempdir().unwrap();
    let fs = Arc::new(Contended::default());
    let storage = Storage::new(fs.clone(), StorageLayout::new(temp_dir.path()));
    let ingestor = Ingestor::with_parts(Registry::with_defaults(), storage, Placeholders::default());

    let path = ingestor.store_cover(Upload::from_bytes("front.png", b"\x89PNG".to_vec())).await.unwrap();
    let claimed = fs.claimed.lock().unwrap().clone().unwrap();
    assert_ne!(path, claimed);
    assert_eq!(std::fs::read(&claimed).unwrap(), b"another upload");
    assert_eq!(std::fs::read(&path).unwrap(), b"\x89PNG");
}

#[tokio::test]
async fn test_identical_uploads_get_distinct_paths() {
    let temp_dir = tempfile::tempdir().unwrap();
    let ingestor = ingestor(temp_dir.path());
    let first = ingestor.ingest(Upload::from_bytes("colour.epub", FULL_EPUB)).await.unwrap();
    let second = ingestor.ingest(Upload::from_bytes("colour.epub", FULL_EPUB)).await.unwrap();
    assert_ne!(first.file_path, second.file_path);
    assert_ne!(first.cover, second.cover);
    assert_eq!(first.file_hash, second.file_hash);
    assert_eq!(files_in(&temp_dir.path().join("ebook")).len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_ingestions() {
    let temp_dir = tempfile::tempdir().unwrap();
    let ingestor = ingestor(temp_dir.path());
    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let ingestor = ingestor.clone();
            tokio::spawn(async move { ingestor.ingest(Upload::from_bytes(format!("book-{i}.epub"), FULL_EPUB)).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }
    assert_eq!(files_in(&temp_dir.path().join("ebook")).len(), 16);
    assert_eq!(files_in(&temp_dir.path().join("cover")).len(), 16);
}

#[test]
fn test_blocking_ingestion() {
    let temp_dir = tempfile::tempdir().unwrap();
    let metadata = ingestor(temp_dir.path()).ingest_blocking(Upload::from_bytes("omens.epub", MULTI_AUTHOR_EPUB)).unwrap();
    assert_eq!(metadata.title, "Good Omens");
    assert!(metadata.file_path.exists());
}

/// Blocks mid-upload until the test lets it continue, so the ingestion can
/// be cancelled after the raw file has been created.
struct GatedReader {
    data: std::io::Cursor<&'static [u8]>,
    reached: SyncSender<()>,
    gate: Receiver<()>,
    paused: bool,
}
impl Read for GatedReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        // First read is the emptiness check, second is the copy into storage.
        if !self.paused && self.data.position() > 0 {
            self.paused = true;
            let _ = self.reached.send(());
            let _ = self.gate.recv();
        }
        let len = buf.len().min(64);
        self.data.read(&mut buf[..len])
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancelled_ingestion_leaves_no_files() {
    let temp_dir = tempfile::tempdir().unwrap();
    let ingestor = ingestor(temp_dir.path());
    let (reached_tx, reached_rx) = sync_channel(1);
    let (gate_tx, gate_rx) = sync_channel(1);
    let reader = GatedReader {
        data: std::io::Cursor::new(FULL_EPUB),
        reached: reached_tx,
        gate: gate_rx,
        paused: false,
    };

    let task = tokio::spawn({
        let ingestor = ingestor.clone();
        async move { ingestor.ingest(Upload::new("colour.epub", reader)).await }
    });
    tokio::task::spawn_blocking(move || reached_rx.recv().unwrap()).await.unwrap();
    // The raw file is being written; cancel the caller, then let the worker finish.
    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());
    gate_tx.send(()).unwrap();

    let ebook_dir = temp_dir.path().join("ebook");
    let mut remaining = files_in(&ebook_dir);
    for _ in 0..100 {
        if remaining.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        remaining = files_in(&ebook_dir);
    }
    assert!(remaining.is_empty(), "orphaned files: {remaining:?}");
    assert!(files_in(&temp_dir.path().join("cover")).is_empty());
}

#[tokio::test]
async fn test_store_cover() {
    let temp_dir = tempfile::tempdir().unwrap();
    let ingestor = ingestor(temp_dir.path());
    let path = ingestor.store_cover(Upload::from_bytes("front.PNG", b"\x89PNG\r\n".to_vec())).await.unwrap();
    assert_eq!(path.parent().unwrap(), temp_dir.path().join("cover"));
    let name = path.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("cover_") && name.ends_with(".png"));
    assert_eq!(std::fs::read(&path).unwrap(), b"\x89PNG\r\n");

    let err = ingestor.store_cover(Upload::from_bytes("front.png", Vec::new())).await.unwrap_err();
    assert_eq!(*err, ErrorKind::EmptyUpload);
    let err = ingestor.store_cover(Upload::from_bytes("front", b"data".to_vec())).await.unwrap_err();
    assert_eq!(*err, ErrorKind::MissingExtension);
}

#[tokio::test]
async fn test_discard() {
    let temp_dir = tempfile::tempdir().unwrap();
    let ingestor = ingestor(temp_dir.path());
    let metadata = ingestor.ingest(Upload::from_bytes("colour.epub", FULL_EPUB)).await.unwrap();
    ingestor.discard(&metadata).await.unwrap();
    assert!(!metadata.file_path.exists());
    assert!(!metadata.cover.path().unwrap().exists());
    // Already gone.
    ingestor.discard(&metadata).await.unwrap();
}

#[tokio::test]
async fn test_discard_refuses_foreign_paths() {
    let temp_dir = tempfile::tempdir().unwrap();
    let ingestor = ingestor(temp_dir.path());
    let mut metadata = ingestor.ingest(Upload::from_bytes("beowulf.epub", ANONYMOUS_EPUB)).await.unwrap();
    let foreign = temp_dir.path().join("keep.txt");
    std::fs::write(&foreign, b"keep").unwrap();
    metadata.file_path = foreign.clone();
    let err = ingestor.discard(&metadata).await.unwrap_err();
    assert_eq!(*err, ErrorKind::StorageFailed);
    assert!(foreign.exists());
}

/// Claims `epub` after the built-in processor and always fails.
struct Impostor;
impl FormatProcessor for Impostor {
    fn name(&self) -> &'static str {
        "IMPOSTOR"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["epub", "txt"]
    }

    fn parse(&self, _storage: &Storage, _path: &Path) -> bindery_extract::error::Result<ParsedBook> {
        exn::bail!(ExtractErrorKind::InvalidDocument("IMPOSTOR"))
    }
}

#[tokio::test]
async fn test_earlier_registration_stays_canonical() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut registry = Registry::with_defaults();
    registry.register(Impostor);
    let ingestor = Ingestor::with_parts(registry, Storage::local(StorageLayout::new(temp_dir.path())), Placeholders::default());

    let metadata = ingestor.ingest(Upload::from_bytes("colour.epub", FULL_EPUB)).await.unwrap();
    assert_eq!(metadata.format, "EPUB");
    let err = ingestor.ingest(Upload::from_bytes("notes.txt", b"hello".to_vec())).await.unwrap_err();
    assert_eq!(*err, ErrorKind::ProcessingFailed("IMPOSTOR".into()));
}
