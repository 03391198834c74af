//! Remote document source.
//!
//! The [`RemoteSource`] trait is the boundary between the synchronization
//! core and the remote API. Implementations return structured data or an
//! explicit [`error::ErrorKind`]; nothing panics across this boundary.
//!
//! - [`NotionClient`] (feature `http`) talks to the Notion REST API.
//! - [`MockRemote`] (feature `mock`) keeps pages in memory for tests.

pub mod error;
pub mod models;
mod source;

#[cfg(feature = "mock")]
pub use crate::source::MockRemote;
#[cfg(feature = "http")]
pub use crate::source::NotionClient;
pub use crate::source::RemoteSource;
use std::sync::Arc;

pub type RemoteHandle = Arc<dyn RemoteSource + Send + Sync>;
