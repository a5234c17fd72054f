//! Format detection and metadata extraction for uploaded ebooks.
//!
//! An upload's [`FormatExtension`] selects a [`FormatProcessor`] from the
//! [`Registry`]. The processor stores the raw bytes, parses the container,
//! and returns [`ExtractedMetadata`] with the written files still
//! [`Staged`] for rollback.

mod consts;
pub mod error;
mod extension;
pub mod formats;
pub mod models;
mod processor;
mod registry;

pub use crate::extension::{FormatExtension, title_from_filename};
pub use crate::models::{Cover, ExtractedMetadata, Placeholders};
pub use crate::processor::{FormatProcessor, ParsedBook, ProcessRequest, Staged, cover_name};
pub use crate::registry::{ProcessorHandle, Registry};
