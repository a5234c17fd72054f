use crate::consts;
use crate::error::{ErrorKind, Result};
use crate::models::Author;
use crate::processor::{FormatProcessor, ParsedBook};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bindery_storage::Storage;
use encoding_rs::{Encoding, UTF_8};
use exn::{OptionExt, ResultExt};
use scraper::{ElementRef, Html, Selector};
use std::io::Read;
use std::path::Path;
use tracing::instrument;

const DECLARATION_LIMIT: usize = 1024;

/// FictionBook 2: a single XML document with the description, body text and
/// base64-encoded images inline.
///
/// The document is decoded using the encoding named in its XML declaration
/// (windows-1251 is common), then read through the HTML parser, which is
/// lenient about the namespace-prefixed attributes FB2 uses (`l:href`,
/// `xlink:href`).
#[derive(Debug, Clone, Copy, Default)]
pub struct Fb2Processor;

impl FormatProcessor for Fb2Processor {
    fn name(&self) -> &'static str {
        "FB2"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["fb2"]
    }

    #[instrument(level = "debug", skip(self, storage))]
    fn parse(&self, storage: &Storage, path: &Path) -> Result<ParsedBook> {
        let mut bytes = Vec::new();
        storage
            .fs()
            .reader(path)
            .or_raise(|| ErrorKind::Storage)?
            .read_to_end(&mut bytes)
            .or_raise(|| ErrorKind::Storage)?;
        let (text, encoding, malformed) = declared_encoding(&bytes).decode(&bytes);
        if malformed {
            tracing::debug!(encoding = encoding.name(), "Document contains bytes invalid in its encoding");
        }
        let document = Html::parse_document(&text);

        let title_info = document
            .select(&consts::FB2_ROOT_SELECTOR)
            .next()
            .and_then(|_| document.select(&consts::FB2_TITLE_INFO_SELECTOR).next())
            .ok_or_raise(|| ErrorKind::InvalidDocument(self.name()))?;

        Ok(ParsedBook {
            title: first_text(title_info, &consts::FB2_BOOK_TITLE_SELECTOR),
            authors: title_info.select(&consts::FB2_AUTHOR_SELECTOR).filter_map(author).collect(),
            cover: cover(&document, title_info),
        })
    }
}

/// The encoding from the `<?xml ... encoding="..."?>` declaration, UTF-8 when
/// there is none or the label is unknown. A byte order mark still wins when
/// decoding.
fn declared_encoding(bytes: &[u8]) -> &'static Encoding {
    let head = &bytes[..bytes.len().min(DECLARATION_LIMIT)];
    let Some(start) = head.windows(5).position(|w| w == b"<?xml") else {
        return UTF_8;
    };
    let Some(end) = head[start..].windows(2).position(|w| w == b"?>") else {
        return UTF_8;
    };
    let declaration = String::from_utf8_lossy(&head[start..start + end]);
    declaration
        .split_once("encoding")
        .and_then(|(_, rest)| rest.trim_start().strip_prefix('='))
        .map(str::trim_start)
        .and_then(|rest| {
            let quote = rest.chars().next().filter(|c| matches!(c, '"' | '\''))?;
            rest[1..].split(quote).next()
        })
        .and_then(|label| Encoding::for_label(label.trim().as_bytes()))
        // An ASCII-readable declaration cannot really be UTF-16.
        .map(Encoding::output_encoding)
        .unwrap_or(UTF_8)
}

fn first_text(element: ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .map(|e| e.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" "))
        .find(|text| !text.is_empty())
}

/// `first-name` and `middle-name` make up the given name, `last-name` the
/// family name; authors known only by a `nickname` fall back to that.
fn author(element: ElementRef<'_>) -> Option<Author> {
    let given: Vec<String> = [&consts::FB2_FIRST_NAME_SELECTOR, &consts::FB2_MIDDLE_NAME_SELECTOR]
        .into_iter()
        .filter_map(|selector| first_text(element, selector))
        .collect();
    let author = Author::new(
        given.join(" "),
        first_text(element, &consts::FB2_LAST_NAME_SELECTOR).unwrap_or_default(),
    );
    if !author.is_empty() {
        return Some(author);
    }
    first_text(element, &consts::FB2_NICKNAME_SELECTOR).map(Author::from)
}

fn cover(document: &Html, title_info: ElementRef<'_>) -> Result<Option<Vec<u8>>> {
    let Some(image) = title_info.select(&consts::FB2_COVER_IMAGE_SELECTOR).next() else {
        return Ok(None);
    };
    let id = ["l:href", "xlink:href", "href"]
        .into_iter()
        .find_map(|attr| image.value().attr(attr))
        .map(|href| href.trim().trim_start_matches('#'))
        .filter(|id| !id.is_empty())
        .ok_or_raise(|| ErrorKind::Cover)?;
    let binary = document
        .select(&consts::FB2_BINARY_SELECTOR)
        .find(|b| b.value().attr("id") == Some(id))
        .ok_or_raise(|| ErrorKind::Cover)?;
    let encoded: String = binary.text().flat_map(|t| t.chars()).filter(|c| !c.is_ascii_whitespace()).collect();
    Ok(Some(STANDARD.decode(encoded).or_raise(|| ErrorKind::Cover)?))
}
