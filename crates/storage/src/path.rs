//! Path validation and security utilities.
//!
//! Stored file names are generated internally, but their extension comes from
//! a user-supplied filename and subdirectory names come from configuration.
//! Both end up joined onto the storage root, so they must never be able to
//! climb out of it.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates that `name` is a single, plain file or directory name.
///
/// > **Note:** This does **not** normalize backslashes, non-UTF8 bytes, or
/// >           platform-specific weirdness. Null bytes are explicitly rejected.
///
/// # Returns
/// Returns the name as a [`PathBuf`] if valid, or
/// [`InvalidPath`](crate::error::ErrorKind::InvalidPath) if it is empty,
/// contains a separator, or refers to the current/parent directory.
///
/// # Examples
///
/// ```
/// use bindery_storage::validate_name;
/// assert!(validate_name("0b0c1f4e.epub").is_ok());
/// assert!(validate_name("cover_0b0c1f4e.epub.jpg").is_ok());
/// assert!(validate_name("ebook/escape.epub").is_err());
/// assert!(validate_name("..").is_err());
/// assert!(validate_name("a\0b").is_err());
/// ```
pub fn validate_name(name: impl AsRef<Path>) -> Result<PathBuf> {
    let name = name.as_ref();
    let mut components = name.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(s)), None) => {
            // Null bytes pass through Path::components() on Unix but cause
            // truncation in C-based syscalls, so reject them explicitly.
            if s.as_encoded_bytes().contains(&0) || s.as_encoded_bytes().contains(&b'\\') {
                exn::bail!(ErrorKind::InvalidPath(name.to_path_buf()));
            }
            // `Path::components()` silently drops trailing separators.
            if name.as_os_str().len() != s.len() {
                exn::bail!(ErrorKind::InvalidPath(name.to_path_buf()));
            }
            Ok(PathBuf::from(s))
        },
        _ => exn::bail!(ErrorKind::InvalidPath(name.to_path_buf())),
    }
}
