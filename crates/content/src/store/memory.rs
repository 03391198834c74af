//! In-memory content and menu store for testing.

use super::permalink;
use crate::error::{ErrorKind, Result};
use crate::models::{ContentRecord, ContentStatus, ContentUpdate, Menu, MenuItem, NewContent, NewMenuItem, Placement};
use crate::{ContentStore, MenuStore};
use async_trait::async_trait;
use std::collections::BTreeMap;
use time::UtcDateTime;
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    next_id: i64,
    records: BTreeMap<i64, ContentRecord>,
    menus: Vec<Menu>,
    items: BTreeMap<i64, MenuItem>,
    create_failure: Option<String>,
    update_failure: Option<String>,
}
impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory implementation of both [`ContentStore`] and [`MenuStore`].
///
/// Records, menus and menu items share one id sequence. Writes can be made
/// to fail with [`fail_creates`](Self::fail_creates) and
/// [`fail_updates`](Self::fail_updates).
///
/// # Examples
///
/// ```
/// use tether_content::{ContentStore, MemoryStore, NewContent};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryStore::new("https://example.com");
/// let id = store.create(NewContent::new("page", "Hello")).await?;
/// assert_eq!(store.permalink(id).await?, Some(format!("https://example.com/?page_id={id}")));
/// # Ok(())
/// # }
/// ```
pub struct MemoryStore {
    permalink_base: String,
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new(permalink_base: impl Into<String>) -> Self {
        Self { permalink_base: permalink_base.into(), state: RwLock::default() }
    }

    /// Delete a record behind the synchronizer's back.
    pub async fn remove(&self, id: i64) -> Option<ContentRecord> {
        self.state.write().await.records.remove(&id)
    }

    /// Make every subsequent `create` fail with `message` (`None` to stop).
    pub async fn fail_creates(&self, message: Option<&str>) {
        self.state.write().await.create_failure = message.map(str::to_string);
    }

    /// Make every subsequent `update` fail with `message` (`None` to stop).
    pub async fn fail_updates(&self, message: Option<&str>) {
        self.state.write().await.update_failure = message.map(str::to_string);
    }

    /// Number of content records, trashed included.
    pub async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
impl Default for MemoryStore {
    fn default() -> Self {
        Self::new("http://localhost")
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create(&self, content: NewContent) -> Result<i64> {
        let mut state = self.state.write().await;
        if let Some(message) = &state.create_failure {
            exn::bail!(ErrorKind::Backend(message.clone()));
        }
        let id = state.next_id();
        state.records.insert(id, ContentRecord {
            id,
            kind: content.kind,
            title: content.title,
            body: content.body,
            status: content.status,
            menu_order: content.menu_order,
            meta: content.meta,
            modified_at: UtcDateTime::now(),
        });
        Ok(id)
    }

    async fn update(&self, id: i64, update: ContentUpdate) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(message) = &state.update_failure {
            exn::bail!(ErrorKind::Backend(message.clone()));
        }
        let record = state.records.get_mut(&id).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(id)))?;
        update.apply(record);
        record.modified_at = UtcDateTime::now();
        Ok(())
    }

    async fn find_by_meta(&self, key: &str, value: &str) -> Result<Vec<i64>> {
        let state = self.state.read().await;
        Ok(state.records.values().filter(|r| r.meta(key) == Some(value)).map(|r| r.id).collect())
    }

    async fn get(&self, id: i64) -> Result<Option<ContentRecord>> {
        Ok(self.state.read().await.records.get(&id).cloned())
    }

    async fn find_with_meta(&self, key: &str) -> Result<Vec<ContentRecord>> {
        let state = self.state.read().await;
        Ok(state
            .records
            .values()
            .filter(|r| r.status != ContentStatus::Trashed && r.meta.contains_key(key))
            .cloned()
            .collect())
    }

    async fn permalink(&self, id: i64) -> Result<Option<String>> {
        let state = self.state.read().await;
        Ok(state
            .records
            .get(&id)
            .filter(|r| r.status != ContentStatus::Trashed)
            .map(|r| permalink(&self.permalink_base, r.id)))
    }
}

#[async_trait]
impl MenuStore for MemoryStore {
    async fn find_menu(&self, name: &str) -> Result<Option<Menu>> {
        Ok(self.state.read().await.menus.iter().find(|m| m.name == name).cloned())
    }

    async fn create_menu(&self, name: &str) -> Result<Menu> {
        let mut state = self.state.write().await;
        let menu = Menu { id: state.next_id(), name: name.to_string() };
        state.menus.push(menu.clone());
        Ok(menu)
    }

    async fn items(&self, menu_id: i64) -> Result<Vec<MenuItem>> {
        let state = self.state.read().await;
        let mut items: Vec<MenuItem> = state.items.values().filter(|i| i.menu_id == menu_id).cloned().collect();
        items.sort_by_key(|i| (i.order, i.id));
        Ok(items)
    }

    async fn create_item(&self, menu_id: i64, item: NewMenuItem) -> Result<i64> {
        let mut state = self.state.write().await;
        if !state.menus.iter().any(|m| m.id == menu_id) {
            exn::bail!(ErrorKind::MenuNotFound(menu_id));
        }
        let id = state.next_id();
        state.items.insert(id, MenuItem {
            id,
            menu_id,
            parent_id: item.parent_id,
            local_content_id: item.local_content_id,
            title: item.title,
            order: item.order,
            origin: item.origin,
        });
        Ok(id)
    }

    async fn update_item(&self, item_id: i64, placement: Placement) -> Result<()> {
        let mut state = self.state.write().await;
        let item = state.items.get_mut(&item_id).ok_or_else(|| exn::Exn::from(ErrorKind::MenuNotFound(item_id)))?;
        item.parent_id = placement.parent_id;
        item.order = placement.order;
        item.title = placement.title;
        Ok(())
    }

    async fn delete_item(&self, item_id: i64) -> Result<()> {
        let mut state = self.state.write().await;
        if state.items.remove(&item_id).is_none() {
            exn::bail!(ErrorKind::MenuNotFound(item_id));
        }
        for item in state.items.values_mut().filter(|i| i.parent_id == Some(item_id)) {
            item.parent_id = None;
        }
        Ok(())
    }
}
