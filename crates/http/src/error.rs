//! HTTP Surface Error Types

use derive_more::{Display, Error};

/// An HTTP surface error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for HTTP surface operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Clone, Debug, Display, Error, PartialEq, Eq)]
pub enum ErrorKind {
    /// The listen address could not be bound
    #[display("could not listen on {_0}")]
    Bind(#[error(not(source))] String),
    /// The server stopped with an I/O error
    #[display("server error")]
    Serve,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Bind(_))
    }
}
