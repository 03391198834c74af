//! Database Error Types

use derive_more::{Display, Error};

/// A database error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for database operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Clone, Debug, Display, Error, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("database error")]
    Database,
    #[display("database migration error")]
    Migration,
    /// A required field was empty.
    #[display("missing required field: {_0}")]
    MissingField(#[error(not(source))] &'static str),
    /// A remote id failed validation.
    #[display("invalid remote id: {_0}")]
    InvalidId(#[error(not(source))] String),
    #[display("batch not found: {_0}")]
    BatchNotFound(#[error(not(source))] String),
    /// Stored data could not be interpreted.
    #[display("invalid database data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database)
    }
}
