//! Configuration Error Types

use derive_more::{Display, Error};

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Clone, Debug, Display, Error, PartialEq, Eq)]
pub enum ErrorKind {
    /// A configuration source could not be read or parsed
    #[display("could not load configuration: {_0}")]
    Load(#[error(not(source))] String),
    /// The configuration file has an extension we do not know how to parse
    #[display("unsupported configuration format: {_0}")]
    UnsupportedFormat(#[error(not(source))] String),
    /// A value is present but unusable
    #[display("invalid configuration value for {field}: {reason}")]
    Invalid {
        field: &'static str,
        #[error(not(source))]
        reason: String,
    },
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
