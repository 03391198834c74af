//! Remote Source Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction. Nothing in this crate panics or throws across the
//! [`RemoteSource`](crate::RemoteSource) boundary: every failure is one of
//! these kinds.

use derive_more::{Display, Error};

/// A remote source error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for remote source operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The resource does not exist, or the integration was never shared with it.
    #[display("remote resource not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// The configured credentials were rejected.
    #[display("remote source rejected credentials")]
    Unauthorized,
    /// Too many requests; back off and try again.
    #[display("remote source rate limit exceeded")]
    RateLimited,
    /// Connection-level failure (DNS, TLS, timeouts).
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
    /// The remote API answered with an error payload.
    #[display("remote API error ({status}): {message}")]
    Api {
        /// HTTP status code of the response.
        status: u16,
        /// Message taken from the error payload.
        message: String,
    },
    /// The response could not be understood.
    #[display("invalid remote response: {_0}")]
    InvalidResponse(#[error(not(source))] &'static str),
    /// The remote source returned nothing usable for this resource.
    #[display("remote resource is empty: {_0}")]
    Empty(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited | Self::Network(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
