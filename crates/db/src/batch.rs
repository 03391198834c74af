//! Batch job store.
//!
//! Written by the batch worker only; everything else reads. Every write is a
//! single-statement update so that marking a batch failed from elsewhere can
//! never be undone by the worker recording its next item.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{BatchRow, BatchStatus, ItemState};
use exn::ResultExt;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use tether_ident::{normalize, validate};
use time::UtcDateTime;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct BatchRepository {
    pool: SqlitePool,
}
impl From<&Database> for BatchRepository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}

fn now() -> i64 {
    UtcDateTime::now().unix_timestamp()
}

fn item_state(state: ItemState) -> &'static str {
    match state {
        ItemState::Queued => "queued",
        ItemState::Processing => "processing",
        ItemState::Success => "success",
        ItemState::Failed => "failed",
    }
}

impl BatchRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Queue a new batch for the given remote ids.
    ///
    /// Ids are validated and normalized; duplicates (in any spelling) are
    /// queued once, in order of first appearance.
    pub async fn create<I, S>(&self, ids: I) -> Result<BatchStatus>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut item_ids: Vec<String> = Vec::new();
        for id in ids {
            let id = id.as_ref();
            validate(id).or_raise(|| ErrorKind::InvalidId(id.to_string()))?;
            let (compact, _) = normalize(id);
            if !item_ids.contains(&compact) {
                item_ids.push(compact);
            }
        }
        if item_ids.is_empty() {
            exn::bail!(ErrorKind::MissingField("ids"));
        }
        let items: BTreeMap<&str, &str> = item_ids.iter().map(|id| (id.as_str(), "queued")).collect();
        let batch_id = Uuid::new_v4().to_string();
        sqlx::query(include_str!("../queries/batch_insert.sql"))
            .bind(&batch_id)
            .bind(i64::try_from(item_ids.len()).or_raise(|| ErrorKind::InvalidData("batch size"))?)
            .bind(serde_json::to_string(&item_ids).or_raise(|| ErrorKind::InvalidData("batch item ids"))?)
            .bind(serde_json::to_string(&items).or_raise(|| ErrorKind::InvalidData("batch items"))?)
            .bind(now())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        tracing::info!(%batch_id, total = item_ids.len(), "batch queued");
        self.require(&batch_id).await
    }

    pub async fn get(&self, batch_id: &str) -> Result<Option<BatchStatus>> {
        let row: Option<BatchRow> = sqlx::query_as("SELECT * FROM batches WHERE batch_id = ?1")
            .bind(batch_id)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(BatchStatus::try_from).transpose()
    }

    /// Like [`get`](Self::get), but a missing batch is an error.
    pub async fn require(&self, batch_id: &str) -> Result<BatchStatus> {
        self.get(batch_id).await?.ok_or_else(|| exn::Exn::from(ErrorKind::BatchNotFound(batch_id.to_string())))
    }

    /// Queued and processing batches, oldest first.
    pub async fn list_active(&self) -> Result<Vec<BatchStatus>> {
        let rows: Vec<BatchRow> = sqlx::query_as(
            "SELECT * FROM batches WHERE status IN ('queued', 'processing') ORDER BY created_at, batch_id",
        )
        .fetch_all(&self.pool)
        .await
        .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(BatchStatus::try_from).collect()
    }

    /// Move a queued batch to processing. Returns `false` if it was not queued.
    pub async fn start(&self, batch_id: &str) -> Result<bool> {
        self.transition(batch_id, "processing", &["queued"], None).await
    }

    /// Mark a processing batch completed. Returns `false` if it was not
    /// processing (for instance because it was failed meanwhile).
    pub async fn complete(&self, batch_id: &str) -> Result<bool> {
        self.transition(batch_id, "completed", &["processing"], None).await
    }

    /// Abort an active batch. Items already recorded keep their state.
    pub async fn fail(&self, batch_id: &str, reason: &str) -> Result<bool> {
        self.transition(batch_id, "failed", &["queued", "processing"], Some(reason)).await
    }

    async fn transition(&self, batch_id: &str, to: &str, from: &[&str], error: Option<&str>) -> Result<bool> {
        let placeholders = (0..from.len()).map(|i| format!("?{}", i + 5)).collect::<Vec<_>>().join(", ");
        let sql = format!(
            "UPDATE batches SET status = ?2, error = COALESCE(?3, error), current_item_id = NULL, updated_at = ?4 \
             WHERE batch_id = ?1 AND status IN ({placeholders})"
        );
        let mut query = sqlx::query(&sql).bind(batch_id).bind(to).bind(error).bind(now());
        for state in from {
            query = query.bind(*state);
        }
        let done = query.execute(&self.pool).await.or_raise(|| ErrorKind::Database)?;
        if done.rows_affected() == 0 {
            // Distinguish "wrong state" from "no such batch".
            self.require(batch_id).await?;
            return Ok(false);
        }
        tracing::debug!(batch_id, status = to, "batch transitioned");
        Ok(true)
    }

    /// Point the batch at the item now being processed.
    pub async fn set_current(&self, batch_id: &str, item_id: &str) -> Result<()> {
        let (compact, _) = normalize(item_id);
        sqlx::query(include_str!("../queries/batch_set_current.sql"))
            .bind(batch_id)
            .bind(compact)
            .bind(now())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// Record the outcome of one item and bump the counters.
    pub async fn record_item(&self, batch_id: &str, item_id: &str, state: ItemState) -> Result<()> {
        let (compact, _) = normalize(item_id);
        let done = sqlx::query(include_str!("../queries/batch_record_item.sql"))
            .bind(batch_id)
            .bind(compact)
            .bind(item_state(state))
            .bind(i64::from(state == ItemState::Success))
            .bind(i64::from(state == ItemState::Failed))
            .bind(now())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        if done.rows_affected() == 0 {
            exn::bail!(ErrorKind::BatchNotFound(batch_id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BatchState;

    const A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const B: &str = "bbbbbbbb-bbbb-bbbb-bbbb-bbbbbbbbbbbb";
    const B_COMPACT: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    async fn repo() -> BatchRepository {
        BatchRepository::from(&Database::connect_in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_create_normalizes_and_dedupes() {
        let repo = repo().await;
        let batch = repo.create([A, B, B_COMPACT, "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA"]).await.unwrap();
        assert_eq!(batch.status, BatchState::Queued);
        assert_eq!(batch.total, 2);
        assert_eq!(batch.item_ids, vec![A, B_COMPACT]);
        assert_eq!(batch.item(B_COMPACT), Some(ItemState::Queued));
        assert!(batch.is_syncing(A));
        assert_eq!(repo.list_active().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_bad_input() {
        let repo = repo().await;
        let empty: [&str; 0] = [];
        assert_eq!(*repo.create(empty).await.unwrap_err(), ErrorKind::MissingField("ids"));
        let err = repo.create([A, "not/an/id"]).await.unwrap_err();
        assert_eq!(*err, ErrorKind::InvalidId("not/an/id".into()));
    }

    #[tokio::test]
    async fn test_full_run() {
        let repo = repo().await;
        let id = repo.create([A, B]).await.unwrap().batch_id;
        assert!(repo.start(&id).await.unwrap());
        assert!(!repo.start(&id).await.unwrap(), "already started");

        repo.set_current(&id, A).await.unwrap();
        let batch = repo.require(&id).await.unwrap();
        assert_eq!(batch.current_item_id.as_deref(), Some(A));
        assert_eq!(batch.item(A), Some(ItemState::Processing));

        repo.record_item(&id, A, ItemState::Success).await.unwrap();
        repo.record_item(&id, B, ItemState::Failed).await.unwrap();
        assert!(repo.complete(&id).await.unwrap());

        let batch = repo.require(&id).await.unwrap();
        assert_eq!(batch.status, BatchState::Completed);
        assert_eq!((batch.processed, batch.successful, batch.failed), (2, 1, 1));
        assert_eq!(batch.item(B_COMPACT), Some(ItemState::Failed));
        assert_eq!(batch.current_item_id, None);
        assert!(repo.list_active().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fail_mid_run_keeps_completed_items() {
        let repo = repo().await;
        let id = repo.create([A, B]).await.unwrap().batch_id;
        repo.start(&id).await.unwrap();
        repo.record_item(&id, A, ItemState::Success).await.unwrap();
        assert!(repo.fail(&id, "operator abort").await.unwrap());
        // The worker finishing its in-flight item must not resurrect the batch.
        repo.record_item(&id, B, ItemState::Success).await.unwrap();
        assert!(!repo.complete(&id).await.unwrap());

        let batch = repo.require(&id).await.unwrap();
        assert_eq!(batch.status, BatchState::Failed);
        assert_eq!(batch.error.as_deref(), Some("operator abort"));
        assert_eq!(batch.item(A), Some(ItemState::Success));
        assert!(!batch.is_syncing(A));
    }

    #[tokio::test]
    async fn test_unknown_batch() {
        let repo = repo().await;
        assert!(repo.get("nope").await.unwrap().is_none());
        assert_eq!(*repo.start("nope").await.unwrap_err(), ErrorKind::BatchNotFound("nope".into()));
        assert!(repo.record_item("nope", A, ItemState::Success).await.is_err());
    }
}
