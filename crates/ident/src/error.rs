//! Identifier Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction, in line with the other `tether` crates.

use derive_more::{Display, Error};

/// An identifier error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for identifier operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// Every variant here is a validation failure: the caller has to correct the
/// input before trying again.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// No identifier was supplied (or it was only whitespace).
    #[display("remote id is empty")]
    Empty,
    /// The identifier is longer than any known serialization.
    #[display("remote id is too long ({_0} characters, maximum {})", crate::MAX_ID_LENGTH)]
    TooLong(#[error(not(source))] usize),
    /// The identifier contains a character outside `[A-Za-z0-9-]`.
    #[display("remote id contains invalid character {_0:?}")]
    InvalidCharacter(#[error(not(source))] char),
    /// A remote type string was neither `page` nor `database`.
    #[display("unknown remote type: {_0}")]
    UnknownType(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Garbage in, garbage out. Retrying the same input never helps.
        false
    }
}
