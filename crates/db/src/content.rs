//! SQLite-backed local content and menu store.

use crate::Database;
use async_trait::async_trait;
use exn::ResultExt;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use tether_content::error::{Error, ErrorKind, Result};
use tether_content::{
    ContentRecord, ContentStatus, ContentStore, ContentUpdate, Menu, MenuItem, MenuStore, NewContent, NewMenuItem,
    Origin, Placement, permalink,
};
use time::UtcDateTime;

fn backend(e: sqlx::Error) -> Error {
    exn::Exn::from(ErrorKind::Backend(e.to_string()))
}

#[derive(sqlx::FromRow)]
struct ContentRow {
    id: i64,
    kind: String,
    title: String,
    body: String,
    status: String,
    menu_order: i64,
    modified_at: i64,
}
impl ContentRow {
    fn into_record(self, meta: BTreeMap<String, String>) -> Result<ContentRecord> {
        Ok(ContentRecord {
            id: self.id,
            kind: self.kind,
            title: self.title,
            body: self.body,
            status: self.status.parse::<ContentStatus>()?,
            menu_order: self.menu_order,
            meta,
            modified_at: UtcDateTime::from_unix_timestamp(self.modified_at)
                .or_raise(|| ErrorKind::InvalidData("modified at".into()))?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct MenuItemRow {
    id: i64,
    menu_id: i64,
    parent_id: Option<i64>,
    local_content_id: Option<i64>,
    title: String,
    position: i64,
    origin: String,
}
impl TryFrom<MenuItemRow> for MenuItem {
    type Error = Error;

    fn try_from(row: MenuItemRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            menu_id: row.menu_id,
            parent_id: row.parent_id,
            local_content_id: row.local_content_id,
            title: row.title,
            order: row.position,
            origin: row.origin.parse::<Origin>()?,
        })
    }
}

/// [`ContentStore`] and [`MenuStore`] over the `content`, `content_meta`,
/// `menus` and `menu_items` tables.
#[derive(Debug, Clone)]
pub struct SqliteContentStore {
    pool: SqlitePool,
    permalink_base: String,
}

impl SqliteContentStore {
    pub fn new(db: &Database, permalink_base: impl Into<String>) -> Self {
        Self { pool: db.pool().clone(), permalink_base: permalink_base.into() }
    }

    async fn meta_of(&self, id: i64) -> Result<BTreeMap<String, String>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT meta_key, meta_value FROM content_meta WHERE content_id = ?1")
                .bind(id)
                .fetch_all(&self.pool)
                .await
                .map_err(backend)?;
        Ok(rows.into_iter().collect())
    }
}

#[async_trait]
impl ContentStore for SqliteContentStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn create(&self, content: NewContent) -> Result<i64> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO content (kind, title, body, status, menu_order, modified_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6) RETURNING id",
        )
        .bind(&content.kind)
        .bind(&content.title)
        .bind(&content.body)
        .bind(content.status.as_str())
        .bind(content.menu_order)
        .bind(UtcDateTime::now().unix_timestamp())
        .fetch_one(&mut *tx)
        .await
        .map_err(backend)?;
        for (key, value) in &content.meta {
            sqlx::query(include_str!("../queries/content_upsert_meta.sql"))
                .bind(id)
                .bind(key)
                .bind(value)
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
        }
        tx.commit().await.map_err(backend)?;
        Ok(id)
    }

    async fn update(&self, id: i64, update: ContentUpdate) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let done = sqlx::query(include_str!("../queries/content_update.sql"))
            .bind(id)
            .bind(update.title.as_deref())
            .bind(update.body.as_deref())
            .bind(update.status.map(|s| s.as_str()))
            .bind(update.menu_order)
            .bind(UtcDateTime::now().unix_timestamp())
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        if done.rows_affected() == 0 {
            exn::bail!(ErrorKind::NotFound(id));
        }
        for (key, value) in &update.meta {
            sqlx::query(include_str!("../queries/content_upsert_meta.sql"))
                .bind(id)
                .bind(key)
                .bind(value)
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
        }
        tx.commit().await.map_err(backend)?;
        Ok(())
    }

    async fn find_by_meta(&self, key: &str, value: &str) -> Result<Vec<i64>> {
        sqlx::query_scalar("SELECT content_id FROM content_meta WHERE meta_key = ?1 AND meta_value = ?2 ORDER BY content_id")
            .bind(key)
            .bind(value)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)
    }

    async fn get(&self, id: i64) -> Result<Option<ContentRecord>> {
        let row: Option<ContentRow> = sqlx::query_as("SELECT * FROM content WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        match row {
            Some(row) => {
                let meta = self.meta_of(row.id).await?;
                Ok(Some(row.into_record(meta)?))
            },
            None => Ok(None),
        }
    }

    async fn find_with_meta(&self, key: &str) -> Result<Vec<ContentRecord>> {
        let rows: Vec<ContentRow> = sqlx::query_as(include_str!("../queries/content_find_with_meta.sql"))
            .bind(key)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let meta = self.meta_of(row.id).await?;
            records.push(row.into_record(meta)?);
        }
        Ok(records)
    }

    async fn permalink(&self, id: i64) -> Result<Option<String>> {
        let found: Option<i64> = sqlx::query_scalar("SELECT id FROM content WHERE id = ?1 AND status != 'trash'")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        Ok(found.map(|id| permalink(&self.permalink_base, id)))
    }
}

#[async_trait]
impl MenuStore for SqliteContentStore {
    async fn find_menu(&self, name: &str) -> Result<Option<Menu>> {
        let row: Option<(i64, String)> = sqlx::query_as("SELECT id, name FROM menus WHERE name = ?1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        Ok(row.map(|(id, name)| Menu { id, name }))
    }

    async fn create_menu(&self, name: &str) -> Result<Menu> {
        let id: i64 = sqlx::query_scalar("INSERT INTO menus (name) VALUES (?1) RETURNING id")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;
        Ok(Menu { id, name: name.to_string() })
    }

    async fn items(&self, menu_id: i64) -> Result<Vec<MenuItem>> {
        let rows: Vec<MenuItemRow> = sqlx::query_as("SELECT * FROM menu_items WHERE menu_id = ?1 ORDER BY position, id")
            .bind(menu_id)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        rows.into_iter().map(MenuItem::try_from).collect()
    }

    async fn create_item(&self, menu_id: i64, item: NewMenuItem) -> Result<i64> {
        let inserted = sqlx::query_scalar::<_, i64>(
            "INSERT INTO menu_items (menu_id, parent_id, local_content_id, title, position, origin) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) RETURNING id",
        )
        .bind(menu_id)
        .bind(item.parent_id)
        .bind(item.local_content_id)
        .bind(&item.title)
        .bind(item.order)
        .bind(item.origin.as_str())
        .fetch_one(&self.pool)
        .await;
        match inserted {
            Ok(id) => Ok(id),
            Err(sqlx::Error::Database(e)) if e.is_foreign_key_violation() => {
                exn::bail!(ErrorKind::MenuNotFound(menu_id))
            },
            Err(e) => Err(backend(e)),
        }
    }

    async fn update_item(&self, item_id: i64, placement: Placement) -> Result<()> {
        let done = sqlx::query("UPDATE menu_items SET parent_id = ?2, position = ?3, title = ?4 WHERE id = ?1")
            .bind(item_id)
            .bind(placement.parent_id)
            .bind(placement.order)
            .bind(&placement.title)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        if done.rows_affected() == 0 {
            exn::bail!(ErrorKind::MenuNotFound(item_id));
        }
        Ok(())
    }

    async fn delete_item(&self, item_id: i64) -> Result<()> {
        // Children fall back to the menu root via ON DELETE SET NULL.
        let done = sqlx::query("DELETE FROM menu_items WHERE id = ?1")
            .bind(item_id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        if done.rows_affected() == 0 {
            exn::bail!(ErrorKind::MenuNotFound(item_id));
        }
        Ok(())
    }
}
