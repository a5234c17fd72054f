use crate::error::{ErrorKind, Result};
use exn::OptionExt;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// A normalized (lowercase, ASCII alphanumeric) format token taken from the
/// trailing suffix of an upload's file name, e.g. `epub`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FormatExtension(String);
impl FormatExtension {
    /// Derive the extension from an upload's original file name.
    ///
    /// Only the final path component is considered, whichever separator the
    /// uploading client used. A name without a dot, with nothing after the
    /// last dot (`book.`), or with nothing before it (`.epub`) has no
    /// extension; there is no inferred default.
    pub fn from_filename(filename: &str) -> Result<Self> {
        let name = base_name(filename);
        let (stem, extension) = name.rsplit_once('.').ok_or_raise(|| ErrorKind::MissingExtension)?;
        if stem.is_empty() || extension.is_empty() {
            exn::bail!(ErrorKind::MissingExtension);
        }
        if !extension.chars().all(|c| c.is_ascii_alphanumeric()) {
            exn::bail!(ErrorKind::MalformedExtension(extension.to_string()));
        }
        Ok(Self(extension.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for FormatExtension {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for FormatExtension {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

/// The title to use when a container declares none: the original file name
/// with its final extension removed.
pub fn title_from_filename(filename: &str) -> String {
    let name = base_name(filename);
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => name.to_string(),
    }
}

fn base_name(filename: &str) -> &str {
    filename.rsplit(['/', '\\']).next().unwrap_or(filename)
}
