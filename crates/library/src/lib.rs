pub mod error;
mod ingest;
mod upload;

pub use crate::ingest::Ingestor;
pub use crate::upload::Upload;
pub use bindery_extract::{Cover, ExtractedMetadata, Placeholders, Registry};
