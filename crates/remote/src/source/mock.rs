//! In-memory remote source for testing.

use crate::RemoteSource;
use crate::error::{ErrorKind, Result};
use crate::models::{Block, PageProperties};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tether_ident::RemoteId;
use tokio::sync::RwLock;

/// In-memory remote source for testing.
///
/// Pages are keyed by their normalized id, so a page inserted with one
/// spelling of its id can be fetched with any other. Failures can be injected
/// per id with [`fail_with`](Self::fail_with).
///
/// # Examples
///
/// ```
/// use tether_ident::RemoteId;
/// use tether_remote::{MockRemote, RemoteSource};
/// use tether_remote::models::PageProperties;
/// use time::UtcDateTime;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let id = "0123456789abcdef0123456789abcdef";
/// let remote = MockRemote::default()
///     .with_page(PageProperties::page(id, "Hello", UtcDateTime::now()), vec![]);
/// let props = remote.fetch_properties(&RemoteId::new("01234567-89ab-cdef-0123-456789abcdef")).await?;
/// assert_eq!(props.title, "Hello");
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct MockRemote {
    pages: RwLock<HashMap<RemoteId, (PageProperties, Vec<Block>)>>,
    failures: RwLock<HashMap<RemoteId, ErrorKind>>,
    fetches: AtomicUsize,
}

impl MockRemote {
    /// Builder-style [`insert`](Self::insert) for test setup.
    pub fn with_page(mut self, properties: PageProperties, blocks: Vec<Block>) -> Self {
        self.pages.get_mut().insert(properties.id.clone(), (properties, blocks));
        self
    }

    /// Add or replace a page.
    pub async fn insert(&self, properties: PageProperties, blocks: Vec<Block>) {
        self.pages.write().await.insert(properties.id.clone(), (properties, blocks));
    }

    /// Make every fetch of `id` fail with `kind` until [`clear_failure`](Self::clear_failure).
    pub async fn fail_with(&self, id: &RemoteId, kind: ErrorKind) {
        self.failures.write().await.insert(id.clone(), kind);
    }

    pub async fn clear_failure(&self, id: &RemoteId) {
        self.failures.write().await.remove(id);
    }

    /// Number of fetch calls (either method) served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    async fn lookup(&self, id: &RemoteId) -> Result<(PageProperties, Vec<Block>)> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        if let Some(kind) = self.failures.read().await.get(id) {
            exn::bail!(kind.clone());
        }
        self.pages
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(id.to_string())))
    }
}

#[async_trait]
impl RemoteSource for MockRemote {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_properties(&self, id: &RemoteId) -> Result<PageProperties> {
        Ok(self.lookup(id).await?.0)
    }

    async fn fetch_blocks(&self, id: &RemoteId) -> Result<Vec<Block>> {
        Ok(self.lookup(id).await?.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BlockKind, Span};
    use time::UtcDateTime;

    const ID: &str = "0123456789abcdef0123456789abcdef";

    fn remote() -> MockRemote {
        MockRemote::default().with_page(
            PageProperties::page(ID, "Hello", UtcDateTime::now()),
            vec![Block::new("b1", BlockKind::Paragraph(vec![Span::plain("Hi")]))],
        )
    }

    #[tokio::test]
    async fn test_fetch_any_spelling() {
        let remote = remote();
        let props = remote.fetch_properties(&RemoteId::new("01234567-89AB-cdef-0123-456789abcdef")).await.unwrap();
        assert_eq!(props.title, "Hello");
        let blocks = remote.fetch_blocks(&RemoteId::new(ID)).await.unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(remote.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_fetch_missing() {
        let remote = MockRemote::default();
        let err = remote.fetch_properties(&RemoteId::new(ID)).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let remote = remote();
        let id = RemoteId::new(ID);
        remote.fail_with(&id, ErrorKind::RateLimited).await;
        let err = remote.fetch_blocks(&id).await.unwrap_err();
        assert_eq!(*err, ErrorKind::RateLimited);
        remote.clear_failure(&id).await;
        assert!(remote.fetch_blocks(&id).await.is_ok());
    }
}
