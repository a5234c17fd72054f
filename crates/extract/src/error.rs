//! Extraction Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// An extraction error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Reading or writing durable storage failed; the input may be fine.
    #[display("storage failure")]
    Storage,
    /// The ebook's storage name was claimed by another writer; draw a new one.
    #[display("storage name already taken")]
    NameTaken,
    /// The file is not a readable container of the expected format.
    #[display("malformed {_0} container")]
    MalformedContainer(#[error(not(source))] &'static str),
    /// The container opened, but lacks the structure the format requires.
    #[display("invalid {_0} document: missing required structure")]
    InvalidDocument(#[error(not(source))] &'static str),
    /// An embedded cover image is referenced but cannot be decoded.
    #[display("unreadable cover image")]
    Cover,
    /// The file name has no usable suffix.
    #[display("file name has no extension")]
    MissingExtension,
    /// The suffix contains characters no format extension uses.
    #[display("malformed file extension: {_0}")]
    MalformedExtension(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Only the disk can change between attempts; the document is either
        // valid or it isn't.
        matches!(self, Self::Storage | Self::NameTaken)
    }
}
