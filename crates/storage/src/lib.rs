//! Durable storage for ingested ebooks.
//!
//! - [`Filesystem`]: the blocking filesystem contract (exists, create, read,
//!   write, copy, delete) with a [local](backend::LocalFilesystem)
//!   implementation and, behind the `mock` feature, a fault-injecting one.
//! - [`StorageLayout`]: the root directory and its `ebook/` and `cover/`
//!   subdirectories.
//! - [`Storage`]: writes files into the layout under collision-free names.
//! - [`StagedFile`]: a rollback guard that deletes a freshly written file
//!   unless it is explicitly committed.

pub mod backend;
pub mod error;
mod layout;
mod path;
mod staged;
mod store;

pub use crate::backend::Filesystem;
pub use crate::layout::{DEFAULT_COVER_DIR, DEFAULT_EBOOK_DIR, StorageLayout};
pub use crate::path::validate_name;
pub use crate::staged::StagedFile;
pub use crate::store::{MAX_NAME_ATTEMPTS, Storage, StoredFile};
use std::sync::Arc;

pub type FilesystemHandle = Arc<dyn Filesystem>;
