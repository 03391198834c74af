//! Hierarchy Error Types

use derive_more::{Display, Error};

/// A hierarchy error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for hierarchy operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Clone, Debug, Display, Error, PartialEq, Eq)]
pub enum ErrorKind {
    /// No local record was synced from this remote id
    #[display("no local content for remote id {_0}")]
    RootNotFound(#[error(not(source))] String),
    /// Reading local content failed
    #[display("content store error")]
    Content,
    /// Reading or writing the navigation menu failed
    #[display("menu store error")]
    Menu,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Content | Self::Menu)
    }
}
