use crate::error::{ErrorKind, Result};
use crate::models::Author;
use crate::processor::{FormatProcessor, ParsedBook};
use bindery_storage::Storage;
use exn::ResultExt;
use rbook::Epub;
use rbook::prelude::*;
use std::io::{Cursor, Read};
use std::path::Path;
use tracing::instrument;

/// EPUB: a zip container with an OPF package document.
///
/// Parsed with `rbook` in non-strict mode, so books with small packaging
/// mistakes (a missing `dc:identifier`, say) are still accepted. The cover is
/// whichever manifest item the package marks as the cover image, through
/// either the EPUB 2 `<meta name="cover">` or the EPUB 3 `cover-image`
/// property.
#[derive(Debug, Clone, Copy, Default)]
pub struct EpubProcessor;

impl FormatProcessor for EpubProcessor {
    fn name(&self) -> &'static str {
        "EPUB"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["epub"]
    }

    // The zip reader needs to seek, so the archive is buffered in memory.
    #[instrument(level = "debug", skip(self, storage))]
    fn parse(&self, storage: &Storage, path: &Path) -> Result<ParsedBook> {
        let mut bytes = Vec::new();
        storage
            .fs()
            .reader(path)
            .or_raise(|| ErrorKind::Storage)?
            .read_to_end(&mut bytes)
            .or_raise(|| ErrorKind::Storage)?;
        let epub = Epub::options()
            .strict(false)
            .read(Cursor::new(bytes))
            .or_raise(|| ErrorKind::MalformedContainer(self.name()))?;

        let metadata = epub.metadata();
        let title = metadata.title().map(|t| t.value().to_string());
        let authors = metadata.creators().map(|c| Author::from(c.value().to_string())).collect();
        let cover = match epub.manifest().cover_image() {
            Some(entry) => entry.read_bytes().map(Some).or_raise(|| ErrorKind::Cover),
            None => Ok(None),
        };

        Ok(ParsedBook { title, authors, cover })
    }
}
