use std::fmt::{Display, Formatter, Result as FmtResult};

/// A declared author of a book.
///
/// Containers differ in how much structure they give names: FictionBook
/// splits them into parts, while EPUB creators are usually a single display
/// string, which lands in `given`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Author {
    /// Given name(s), including any middle names.
    pub given: String,
    /// Family name.
    pub family: String,
}
impl Author {
    pub fn new(given: impl Into<String>, family: impl Into<String>) -> Self {
        Self {
            given: given.into(),
            family: family.into(),
        }
    }

    /// Returns `true` if the author has no printable name at all.
    pub fn is_empty(&self) -> bool {
        self.given.trim().is_empty() && self.family.trim().is_empty()
    }
}

impl From<String> for Author {
    fn from(name: String) -> Self {
        Self::new(name, "")
    }
}

impl Display for Author {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match (self.given.trim(), self.family.trim()) {
            (given, "") => f.write_str(given),
            ("", family) => f.write_str(family),
            (given, family) => write!(f, "{given} {family}"),
        }
    }
}

/// Format a list of authors for display, as `"given family"` pairs joined by
/// `", "`. Nameless entries are skipped; if nothing is left, `unknown` is
/// returned instead.
pub fn format_authors(authors: &[Author], unknown: &str) -> String {
    let names: Vec<String> = authors.iter().filter(|a| !a.is_empty()).map(ToString::to_string).collect();
    if names.is_empty() { unknown.to_string() } else { names.join(", ") }
}
