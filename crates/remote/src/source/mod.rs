//! Remote source trait and implementations.

#[cfg(feature = "mock")]
mod mock;
#[cfg(feature = "http")]
mod notion;

#[cfg(feature = "mock")]
pub use self::mock::MockRemote;
#[cfg(feature = "http")]
pub use self::notion::NotionClient;
use crate::error::Result;
use crate::models::{Block, PageProperties};
use async_trait::async_trait;
use tether_ident::RemoteId;

/// Read-only access to a hierarchical document source.
///
/// Both methods block on network I/O in real implementations; callers on a
/// latency-sensitive path should queue work to the batch worker instead.
///
/// # Examples
///
/// ```no_run
/// use tether_ident::RemoteId;
/// use tether_remote::{RemoteSource, error::Result};
///
/// async fn title_of(source: &dyn RemoteSource, id: &RemoteId) -> Result<String> {
///     Ok(source.fetch_properties(id).await?.title)
/// }
/// ```
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Name of the source, for logging only.
    fn name(&self) -> &str;

    /// Fetch the top-level properties (title, timestamps, parent) of a page
    /// or database.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the
    /// resource does not exist or is not shared with the integration.
    async fn fetch_properties(&self, id: &RemoteId) -> Result<PageProperties>;

    /// Fetch the full block tree of a page, children included.
    ///
    /// Sub-pages are returned as [`ChildPage`](crate::models::BlockKind::ChildPage)
    /// blocks; their content is *not* fetched.
    async fn fetch_blocks(&self, id: &RemoteId) -> Result<Vec<Block>>;
}
