//! Content Store Error Types

use derive_more::{Display, Error};

/// A content store error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for content store operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Clone, Debug, Display, Error, PartialEq, Eq)]
pub enum ErrorKind {
    /// Content record does not exist
    #[display("content not found: {_0}")]
    NotFound(#[error(not(source))] i64),
    /// Menu or menu item does not exist
    #[display("menu entry not found: {_0}")]
    MenuNotFound(#[error(not(source))] i64),
    /// Stored data could not be interpreted
    #[display("invalid stored data: {_0}")]
    InvalidData(#[error(not(source))] String),
    /// Underlying store failed; the message is the store's own
    #[display("{_0}")]
    Backend(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Backend(_))
    }
}
