//! Command Error Types

use derive_more::{Display, Error};

/// A command error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for commands.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Clone, Debug, Display, Error, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("configuration error")]
    Config,
    #[display("database error")]
    Database,
    /// Fetching commands need `notion.token`
    #[display("no Notion token configured (set TETHER_NOTION__TOKEN or notion.token)")]
    MissingToken,
    #[display("registration failed")]
    Register,
    #[display("sync failed")]
    Sync,
    #[display("{_0} of {_1} items failed")]
    BatchItems(#[error(not(source))] u64, #[error(not(source))] u64),
    #[display("menu synchronization failed")]
    Menu,
    #[display("server error")]
    Server,
    #[display("could not write output")]
    Output,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database | Self::Sync | Self::BatchItems(..))
    }
}
