mod author;
mod metadata;

pub use self::author::{Author, format_authors};
pub use self::metadata::{Cover, DEFAULT_COVER, ExtractedMetadata, Placeholders, UNKNOWN_AUTHOR};
