//! Library Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Why an ingestion did not produce a book.
///
/// ### Rejected Input
/// Reported before anything is written; never worth retrying.
/// - [`ErrorKind::EmptyUpload`]
/// - [`ErrorKind::MissingExtension`]
/// - [`ErrorKind::UnsupportedFormat`]
///
/// ### Failures
/// Reported after any rollback has been attempted.
/// - [`ErrorKind::ProcessingFailed`] - the upload is malformed.
/// - [`ErrorKind::StorageFailed`] - the environment is at fault.
/// - [`ErrorKind::Interrupted`]
/// - [`ErrorKind::Config`]
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("upload is empty")]
    EmptyUpload,
    #[display("file name has no usable extension")]
    MissingExtension,
    #[display("unsupported format: {_0}")]
    UnsupportedFormat(#[error(not(source))] String),
    /// The container could not be parsed; the parse error is attached.
    #[display("failed to process {_0} upload")]
    ProcessingFailed(#[error(not(source))] String),
    /// Creating directories, writing or deleting files failed.
    #[display("storage failure")]
    StorageFailed,
    /// The blocking worker running the ingestion panicked or was shut down.
    #[display("ingestion interrupted")]
    Interrupted,
    #[display("invalid configuration")]
    Config,
}

impl ErrorKind {
    /// Returns `true` if the upload itself was rejected.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::EmptyUpload | Self::MissingExtension | Self::UnsupportedFormat(_))
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageFailed | Self::Interrupted)
    }
}
