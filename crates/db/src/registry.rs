//! Link registry: remote id ↔ local content ↔ public slug ↔ sync state.
//!
//! The registry is a best-effort index rather than a transactional ledger.
//! Only [`LinkRegistry::register`] reports failures; lookups answer "not
//! found" and updates answer `false` when the database misbehaves, after
//! logging why.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{EntryRow, RegistryEntry};
use crate::slug;
use exn::ResultExt;
use sqlx::SqlitePool;
use tether_ident::{RemoteType, normalize};
use time::UtcDateTime;
use tracing::instrument;

/// Attempts at finding a free slug before giving up on an insert that keeps
/// colliding with concurrent registrations.
const MAX_INSERT_ATTEMPTS: usize = 3;

/// Input to [`LinkRegistry::register`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Registration {
    pub remote_id: String,
    pub title: String,
    pub kind: RemoteType,
    pub slug: Option<String>,
    pub local_content_id: Option<i64>,
    pub remote_url: Option<String>,
}
impl Registration {
    pub fn new(remote_id: impl Into<String>, title: impl Into<String>, kind: RemoteType) -> Self {
        Self {
            remote_id: remote_id.into(),
            title: title.into(),
            kind,
            slug: None,
            local_content_id: None,
            remote_url: None,
        }
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn with_local_content_id(mut self, id: i64) -> Self {
        self.local_content_id = Some(id);
        self
    }

    pub fn with_remote_url(mut self, url: impl Into<String>) -> Self {
        self.remote_url = Some(url.into()).filter(|u: &String| !u.is_empty());
        self
    }
}

#[derive(Debug, Clone)]
pub struct LinkRegistry {
    pool: SqlitePool,
}
impl From<&Database> for LinkRegistry {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}

impl LinkRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Register
    // =========================================================================

    /// Upsert an entry by normalized remote id, returning its entry id.
    ///
    /// Slug resolution, in order:
    /// 1. a caller-supplied slug (sanitized, and suffixed if another entry
    ///    already owns it);
    /// 2. the existing entry's slug, if the title did not change;
    /// 3. a slug generated from the title, falling back to the raw remote id
    ///    when the title has no URL-safe characters, suffixed `-2`, `-3`, ...
    ///    on collision with another entry.
    ///
    /// Fails only when the remote id or title is blank, or on database error.
    #[instrument(skip_all, fields(remote_id = %registration.remote_id))]
    pub async fn register(&self, registration: Registration) -> Result<i64> {
        let raw_id = registration.remote_id.trim();
        if raw_id.is_empty() {
            exn::bail!(ErrorKind::MissingField("remote_id"));
        }
        let title = registration.title.trim();
        if title.is_empty() {
            exn::bail!(ErrorKind::MissingField("title"));
        }
        let (compact, delimited) = normalize(raw_id);
        let existing = self.fetch_by_remote_id(raw_id).await?;
        let own_id = existing.as_ref().map(|e| e.id);
        let now = UtcDateTime::now().unix_timestamp();

        if let Some(entry) = &existing {
            let slug = match registration.slug.as_deref() {
                Some(requested) => self.unique_slug(&slug_or_placeholder(requested, &compact), own_id).await?,
                None if entry.remote_title == title => entry.slug.clone(),
                None => self.unique_slug(&slug_or_placeholder(title, &compact), own_id).await?,
            };
            sqlx::query(include_str!("../queries/registry_update.sql"))
                .bind(entry.id)
                .bind(&compact)
                .bind(&delimited)
                .bind(registration.kind.as_str())
                .bind(title)
                .bind(registration.remote_url.as_deref())
                .bind(&slug)
                .bind(registration.local_content_id)
                .bind(now)
                .execute(&self.pool)
                .await
                .or_raise(|| ErrorKind::Database)?;
            return Ok(entry.id);
        }

        let base = slug_or_placeholder(registration.slug.as_deref().unwrap_or(title), &compact);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let slug = self.unique_slug(&base, None).await?;
            let inserted = sqlx::query_scalar::<_, i64>(include_str!("../queries/registry_insert.sql"))
                .bind(&compact)
                .bind(&delimited)
                .bind(registration.kind.as_str())
                .bind(title)
                .bind(registration.remote_url.as_deref())
                .bind(&slug)
                .bind(registration.local_content_id)
                .bind(now)
                .fetch_one(&self.pool)
                .await;
            match inserted {
                Ok(id) => return Ok(id),
                // Another registration took the slug between our check and the insert.
                Err(sqlx::Error::Database(e)) if e.is_unique_violation() && attempt < MAX_INSERT_ATTEMPTS => {
                    tracing::debug!(%slug, attempt, "slug taken concurrently, retrying");
                },
                Err(e) => return Err(e).or_raise(|| ErrorKind::Database),
            }
        }
    }

    /// `base`, or `base-N` for the smallest `N >= 2` no other entry owns.
    async fn unique_slug(&self, base: &str, own_id: Option<i64>) -> Result<String> {
        let mut candidate = base.to_string();
        let mut n = 1;
        while let Some(owner) = self.slug_owner(&candidate).await? {
            if Some(owner) == own_id {
                break;
            }
            n += 1;
            candidate = slug::with_suffix(base, n);
        }
        Ok(candidate)
    }

    async fn slug_owner(&self, slug: &str) -> Result<Option<i64>> {
        sqlx::query_scalar("SELECT id FROM registry WHERE slug = ?1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    async fn fetch_by_remote_id(&self, remote_id: &str) -> Result<Option<RegistryEntry>> {
        let (compact, delimited) = normalize(remote_id);
        let row: Option<EntryRow> = sqlx::query_as(include_str!("../queries/registry_find_by_remote_id.sql"))
            .bind(compact)
            .bind(delimited)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(RegistryEntry::try_from).transpose()
    }

    /// Find an entry by any spelling of its remote id.
    pub async fn find_by_remote_id(&self, remote_id: &str) -> Option<RegistryEntry> {
        degrade("find_by_remote_id", self.fetch_by_remote_id(remote_id).await).flatten()
    }

    pub async fn find_by_slug(&self, slug: &str) -> Option<RegistryEntry> {
        let row = sqlx::query_as::<_, EntryRow>("SELECT * FROM registry WHERE slug = ?1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
            .and_then(|row| row.map(RegistryEntry::try_from).transpose());
        degrade("find_by_slug", row).flatten()
    }

    pub async fn find_by_id(&self, entry_id: i64) -> Option<RegistryEntry> {
        let row = sqlx::query_as::<_, EntryRow>("SELECT * FROM registry WHERE id = ?1")
            .bind(entry_id)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
            .and_then(|row| row.map(RegistryEntry::try_from).transpose());
        degrade("find_by_id", row).flatten()
    }

    /// A page of entries ordered by title.
    pub async fn list(&self, limit: u32, offset: u32) -> Result<Vec<RegistryEntry>> {
        let rows: Vec<EntryRow> = sqlx::query_as("SELECT * FROM registry ORDER BY remote_title, id LIMIT ?1 OFFSET ?2")
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(RegistryEntry::try_from).collect()
    }

    pub async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM registry")
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        u64::try_from(count).or_raise(|| ErrorKind::InvalidData("row count"))
    }

    // =========================================================================
    // Targeted updates
    // =========================================================================

    /// Link the entry to its local content and flag it synced.
    pub async fn mark_synced(&self, remote_id: &str, local_content_id: i64, local_content_type: &str) -> bool {
        let (compact, delimited) = normalize(remote_id);
        let result = sqlx::query(include_str!("../queries/registry_mark_synced.sql"))
            .bind(compact)
            .bind(delimited)
            .bind(local_content_id)
            .bind(local_content_type)
            .bind(UtcDateTime::now().unix_timestamp())
            .execute(&self.pool)
            .await;
        updated("mark_synced", result)
    }

    /// Drop the local link, e.g. after the local content vanished.
    pub async fn mark_not_synced(&self, remote_id: &str) -> bool {
        let (compact, delimited) = normalize(remote_id);
        let result = sqlx::query(include_str!("../queries/registry_mark_not_synced.sql"))
            .bind(compact)
            .bind(delimited)
            .bind(UtcDateTime::now().unix_timestamp())
            .execute(&self.pool)
            .await;
        updated("mark_not_synced", result)
    }

    /// Record a successful sync. Clears any previous sync error.
    pub async fn update_sync_timestamps(
        &self,
        remote_id: &str,
        remote_modified: UtcDateTime,
        local_synced: UtcDateTime,
    ) -> bool {
        let (compact, delimited) = normalize(remote_id);
        let result = sqlx::query(include_str!("../queries/registry_update_timestamps.sql"))
            .bind(compact)
            .bind(delimited)
            .bind(remote_modified.unix_timestamp())
            .bind(local_synced.unix_timestamp())
            .bind(UtcDateTime::now().unix_timestamp())
            .execute(&self.pool)
            .await;
        updated("update_sync_timestamps", result)
    }

    pub async fn update_sync_error(&self, remote_id: &str, message: &str) -> bool {
        let (compact, delimited) = normalize(remote_id);
        let result = sqlx::query(include_str!("../queries/registry_update_error.sql"))
            .bind(compact)
            .bind(delimited)
            .bind(message)
            .bind(UtcDateTime::now().unix_timestamp())
            .execute(&self.pool)
            .await;
        updated("update_sync_error", result)
    }

    /// Count a routed request. Never fails; routing must not depend on it.
    pub async fn increment_access(&self, entry_id: i64) {
        let result = sqlx::query(include_str!("../queries/registry_increment_access.sql"))
            .bind(entry_id)
            .bind(UtcDateTime::now().unix_timestamp())
            .execute(&self.pool)
            .await;
        if let Err(e) = result {
            tracing::warn!(entry_id, error = %e, "failed to record access");
        }
    }
}

/// Slug derived from `text`, or the raw id when `text` has nothing URL-safe.
fn slug_or_placeholder(text: &str, compact_id: &str) -> String {
    match slug::sanitize(text) {
        s if s.is_empty() => compact_id.to_string(),
        s => s,
    }
}

fn degrade<T>(operation: &'static str, result: Result<T>) -> Option<T> {
    result
        .inspect_err(|e| tracing::warn!(operation, error = %(**e), "registry lookup failed"))
        .ok()
}

fn updated(operation: &'static str, result: sqlx::Result<sqlx::sqlite::SqliteQueryResult>) -> bool {
    match result {
        Ok(done) => done.rows_affected() > 0,
        Err(e) => {
            tracing::warn!(operation, error = %e, "registry update failed");
            false
        },
    }
}
