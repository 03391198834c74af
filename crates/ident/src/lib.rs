//! Remote document identifiers.
//!
//! The same logical Notion id shows up in at least three spellings: compact
//! (`0123456789abcdef0123456789abcdef`) from page URLs, delimited
//! (`01234567-89ab-cdef-0123-456789abcdef`) from the API, and whatever a human
//! pasted into a form (mixed case, stray whitespace). Every lookup anywhere in
//! the workspace goes through [`normalize`] so that none of them miss because
//! of formatting drift.
//!
//! ```
//! use tether_ident::normalize;
//!
//! let (compact, delimited) = normalize("01234567-89AB-CDEF-0123-456789ABCDEF");
//! assert_eq!(compact, "0123456789abcdef0123456789abcdef");
//! assert_eq!(delimited, "01234567-89ab-cdef-0123-456789abcdef");
//! ```

pub mod error;

use crate::error::{ErrorKind, Result};
use std::fmt;
use std::str::FromStr;

/// Length of the compact (separator-free) form.
pub const COMPACT_LENGTH: usize = 32;
/// Length of the delimited (8-4-4-4-12) form.
pub const DELIMITED_LENGTH: usize = 36;
/// Longest identifier accepted by [`validate`].
pub const MAX_ID_LENGTH: usize = 64;

const SEPARATOR: char = '-';
const GROUPS: [usize; 5] = [8, 4, 4, 4, 12];

/// Canonicalizes a remote id into its `(compact, delimited)` forms.
///
/// Separators are removed and the remainder lower-cased. When exactly 32
/// characters remain, the delimited form is the 8-4-4-4-12 grouping of the
/// compact form. Anything else (placeholder ids, test fixtures, truncated
/// input) is passed through unchanged (apart from surrounding whitespace) in
/// both outputs. This function never fails.
pub fn normalize(id: impl AsRef<str>) -> (String, String) {
    let trimmed = id.as_ref().trim();
    let stripped: String = trimmed.chars().filter(|c| *c != SEPARATOR).collect();
    if stripped.chars().count() != COMPACT_LENGTH {
        return (trimmed.to_string(), trimmed.to_string());
    }
    let compact = stripped.to_lowercase();
    let mut delimited = String::with_capacity(DELIMITED_LENGTH);
    let mut offset = 0;
    for (i, len) in GROUPS.iter().enumerate() {
        if i > 0 {
            delimited.push(SEPARATOR);
        }
        // Unvalidated input is not guaranteed to be ASCII; walk chars, not bytes.
        delimited.extend(compact.chars().skip(offset).take(*len));
        offset += len;
    }
    (compact, delimited)
}

/// Checks that `id` is plausible before any I/O is attempted with it.
///
/// Rejects empty input, input longer than [`MAX_ID_LENGTH`], and any
/// character outside `[A-Za-z0-9-]`. Surrounding whitespace is ignored.
pub fn validate(id: impl AsRef<str>) -> Result<()> {
    let id = id.as_ref().trim();
    if id.is_empty() {
        exn::bail!(ErrorKind::Empty);
    }
    let length = id.chars().count();
    if length > MAX_ID_LENGTH {
        exn::bail!(ErrorKind::TooLong(length));
    }
    if let Some(c) = id.chars().find(|c| !(c.is_ascii_alphanumeric() || *c == SEPARATOR)) {
        exn::bail!(ErrorKind::InvalidCharacter(c));
    }
    Ok(())
}

/// Builds the public URL of a remote resource on the remote origin.
///
/// The compact form is used, which is also what Notion itself puts in page
/// URLs. A trailing slash on the origin is tolerated.
pub fn remote_url(origin: impl AsRef<str>, id: &RemoteId) -> String {
    format!("{}/{}", origin.as_ref().trim_end_matches('/'), id.compact())
}

/// A remote id carrying both of its normalized serializations.
///
/// Equality and hashing use the compact form only, so two `RemoteId`s built
/// from different spellings of the same id compare equal.
#[derive(Clone, Debug)]
pub struct RemoteId {
    compact: String,
    delimited: String,
}
impl RemoteId {
    /// Normalizes without validating. See [`RemoteId::parse`] for the
    /// validating constructor.
    pub fn new(id: impl AsRef<str>) -> Self {
        let (compact, delimited) = normalize(id);
        Self { compact, delimited }
    }

    /// Validates, then normalizes.
    pub fn parse(id: impl AsRef<str>) -> Result<Self> {
        validate(id.as_ref())?;
        Ok(Self::new(id))
    }

    pub fn compact(&self) -> &str {
        &self.compact
    }

    pub fn delimited(&self) -> &str {
        &self.delimited
    }

    /// Whether both forms were derivable, i.e. this is a full 32-character id
    /// rather than a pass-through placeholder.
    pub fn is_canonical(&self) -> bool {
        self.compact != self.delimited
    }

    /// Returns `true` if `other` is any spelling of this id.
    pub fn matches(&self, other: impl AsRef<str>) -> bool {
        let (compact, _) = normalize(other);
        compact == self.compact
    }
}
impl PartialEq for RemoteId {
    fn eq(&self, other: &Self) -> bool {
        self.compact == other.compact
    }
}
impl Eq for RemoteId {}
impl std::hash::Hash for RemoteId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.compact.hash(state);
    }
}
impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.compact)
    }
}
impl FromStr for RemoteId {
    type Err = error::Error;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}
impl AsRef<RemoteId> for RemoteId {
    fn as_ref(&self) -> &RemoteId {
        self
    }
}

/// Kind of remote resource.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RemoteType {
    #[default]
    Page,
    Database,
}
impl RemoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Database => "database",
        }
    }
}
impl fmt::Display for RemoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
impl FromStr for RemoteType {
    type Err = error::Error;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "page" => Ok(Self::Page),
            "database" => Ok(Self::Database),
            other => exn::bail!(ErrorKind::UnknownType(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const COMPACT: &str = "0123456789abcdef0123456789abcdef";
    const DELIMITED: &str = "01234567-89ab-cdef-0123-456789abcdef";

    #[rstest]
    #[case(COMPACT)]
    #[case(DELIMITED)]
    #[case("0123456789ABCDEF0123456789ABCDEF")]
    #[case("01234567-89AB-cdef-0123-456789ABCDEF")]
    #[case("  01234567-89ab-cdef-0123-456789abcdef\n")]
    #[case("0123-4567-89ab-cdef-0123-4567-89ab-cdef")]
    fn test_every_spelling_normalizes_identically(#[case] input: &str) {
        let (compact, delimited) = normalize(input);
        assert_eq!(compact, COMPACT);
        assert_eq!(delimited, DELIMITED);
        assert_eq!(compact.len(), COMPACT_LENGTH);
        assert_eq!(delimited.len(), DELIMITED_LENGTH);
    }

    #[rstest]
    #[case("abc123")]
    #[case("ABC-123")]
    #[case("0123456789abcdef0123456789abcde")]
    #[case("")]
    fn test_short_ids_pass_through_unchanged(#[case] input: &str) {
        let (compact, delimited) = normalize(input);
        assert_eq!(compact, input);
        assert_eq!(delimited, input);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let (compact, delimited) = normalize(DELIMITED);
        assert_eq!(normalize(&compact), (compact.clone(), delimited.clone()));
        assert_eq!(normalize(&delimited), (compact, delimited));
    }

    #[rstest]
    #[case(COMPACT)]
    #[case(DELIMITED)]
    #[case("abc123")]
    fn test_validate_accepts(#[case] input: &str) {
        assert!(validate(input).is_ok());
    }

    #[test]
    fn test_validate_rejects_empty() {
        let err = validate("   ").unwrap_err();
        assert_eq!(*err, ErrorKind::Empty);
    }

    #[test]
    fn test_validate_rejects_long() {
        let err = validate("a".repeat(MAX_ID_LENGTH + 1)).unwrap_err();
        assert_eq!(*err, ErrorKind::TooLong(MAX_ID_LENGTH + 1));
    }

    #[rstest]
    #[case("abc/123", '/')]
    #[case("abc 123", ' ')]
    #[case("../etc", '.')]
    #[case("abc?x=1", '?')]
    fn test_validate_rejects_characters(#[case] input: &str, #[case] bad: char) {
        let err = validate(input).unwrap_err();
        assert_eq!(*err, ErrorKind::InvalidCharacter(bad));
    }

    #[test]
    fn test_remote_id_equality_ignores_spelling() {
        assert_eq!(RemoteId::new(COMPACT), RemoteId::new(DELIMITED));
        assert!(RemoteId::new(COMPACT).matches("0123456789ABCDEF0123456789ABCDEF"));
        assert!(RemoteId::new(COMPACT).is_canonical());
        assert!(!RemoteId::new("abc123").is_canonical());
    }

    #[test]
    fn test_remote_url_uses_compact_form() {
        let id = RemoteId::new(DELIMITED);
        assert_eq!(remote_url("https://www.notion.so/", &id), format!("https://www.notion.so/{COMPACT}"));
        assert_eq!(remote_url("https://www.notion.so", &RemoteId::new("abc123")), "https://www.notion.so/abc123");
    }

    #[rstest]
    #[case("page", RemoteType::Page)]
    #[case("Database", RemoteType::Database)]
    fn test_remote_type_parses(#[case] input: &str, #[case] expected: RemoteType) {
        assert_eq!(input.parse::<RemoteType>().unwrap(), expected);
        assert_eq!(expected.to_string(), input.to_lowercase());
    }

    #[test]
    fn test_remote_type_rejects_unknown() {
        assert!("block".parse::<RemoteType>().is_err());
    }
}
