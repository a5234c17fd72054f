use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::io::{Cursor, Read};

/// An uploaded file: its bytes and the name the client gave it.
///
/// The name is only used to detect the format and as a fallback title; it
/// never becomes part of a storage path.
pub struct Upload {
    pub(crate) filename: String,
    pub(crate) reader: Box<dyn Read + Send>,
}
impl Upload {
    pub fn new(filename: impl Into<String>, reader: impl Read + Send + 'static) -> Self {
        Self {
            filename: filename.into().trim().to_string(),
            reader: Box::new(reader),
        }
    }

    /// An upload already held in memory.
    pub fn from_bytes(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(filename, Cursor::new(bytes.into()))
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }
}

impl Debug for Upload {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Upload").field("filename", &self.filename).finish_non_exhaustive()
    }
}
