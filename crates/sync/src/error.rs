//! Sync Error Types
//!
//! Mirrors the failure taxonomy callers act on: fix the input, retry later,
//! or inspect the partially synced local record.

use derive_more::{Display, Error};

/// A sync error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Clone, Debug, Display, Error, PartialEq, Eq)]
pub enum ErrorKind {
    /// The remote id is malformed. Rejected before any I/O.
    #[display("invalid remote id: {_0}")]
    Validation(#[error(not(source))] String),
    /// The remote source failed or returned nothing. No local side effects.
    #[display("fetch failed: {_0}")]
    Fetch(#[error(not(source))] String),
    /// The local store refused to create or look up content; the store's own
    /// message.
    #[display("{_0}")]
    Storage(#[error(not(source))] String),
    /// The registry could not record the resource.
    #[display("registry error: {_0}")]
    Registry(#[error(not(source))] String),
    /// Converting the remote blocks failed after the local record existed.
    #[display("conversion failed for local content {local_content_id}: {message}")]
    Conversion {
        local_content_id: i64,
        #[error(not(source))]
        message: String,
    },
    /// Writing converted content failed after the local record existed.
    #[display("update failed for local content {local_content_id}: {message}")]
    Persist {
        local_content_id: i64,
        #[error(not(source))]
        message: String,
    },
    /// A batch could not be run.
    #[display("batch error: {_0}")]
    Batch(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Fetch(_) | Self::Storage(_) | Self::Persist { .. })
    }

    /// The local record left behind by a partial failure.
    pub fn local_content_id(&self) -> Option<i64> {
        match self {
            Self::Conversion { local_content_id, .. } | Self::Persist { local_content_id, .. } => {
                Some(*local_content_id)
            },
            _ => None,
        }
    }
}
