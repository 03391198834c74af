//! Content and menu store traits.

#[cfg(feature = "mock")]
mod memory;

#[cfg(feature = "mock")]
pub use self::memory::MemoryStore;
use crate::error::Result;
use crate::models::{ContentRecord, ContentUpdate, Menu, MenuItem, NewContent, NewMenuItem, Placement};
use async_trait::async_trait;

/// Builds the public permalink of a record.
pub fn permalink(base: &str, id: i64) -> String {
    format!("{}/?page_id={id}", base.trim_end_matches('/'))
}

/// CRUD over local content records and their key/value metadata.
///
/// # Examples
///
/// ```
/// use tether_content::{ContentStore, NewContent, META_REMOTE_ID, error::Result};
///
/// async fn create_once(store: &dyn ContentStore, remote_id: &str) -> Result<i64> {
///     if let Some(id) = store.find_by_meta(META_REMOTE_ID, remote_id).await?.first() {
///         return Ok(*id);
///     }
///     store.create(NewContent::new("page", "Untitled").with_meta(META_REMOTE_ID, remote_id)).await
/// }
/// ```
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Name of the store, for logging only.
    fn name(&self) -> &str;

    /// Create a record, returning its id.
    async fn create(&self, content: NewContent) -> Result<i64>;

    /// Apply a partial update.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the record
    /// does not exist.
    async fn update(&self, id: i64, update: ContentUpdate) -> Result<()>;

    /// Ids of every record (trashed included) whose `key` meta equals
    /// `value` exactly, lowest id first.
    async fn find_by_meta(&self, key: &str, value: &str) -> Result<Vec<i64>>;

    async fn get(&self, id: i64) -> Result<Option<ContentRecord>>;

    /// Every non-trashed record carrying the `key` meta, whatever its value.
    async fn find_with_meta(&self, key: &str) -> Result<Vec<ContentRecord>>;

    /// Public URL of a record, or `None` if it is missing or trashed.
    async fn permalink(&self, id: i64) -> Result<Option<String>>;
}

/// Named navigation menus made of nested items.
#[async_trait]
pub trait MenuStore: Send + Sync {
    async fn find_menu(&self, name: &str) -> Result<Option<Menu>>;

    async fn create_menu(&self, name: &str) -> Result<Menu>;

    /// Every item of the menu, ordered by `order` then id.
    async fn items(&self, menu_id: i64) -> Result<Vec<MenuItem>>;

    async fn create_item(&self, menu_id: i64, item: NewMenuItem) -> Result<i64>;

    /// Move and relabel an item. The origin of an item never changes.
    async fn update_item(&self, item_id: i64, placement: Placement) -> Result<()>;

    /// Delete an item. Its children are re-parented to the root of the menu.
    async fn delete_item(&self, item_id: i64) -> Result<()>;
}
