use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifecycle of a batch job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    Queued,
    Processing,
    Completed,
    Failed,
}
impl BatchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Queued or processing.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::Processing)
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Progress of one id inside a batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    Queued,
    Processing,
    Success,
    Failed,
}
impl ItemState {
    /// The worker is done with this item, one way or the other.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

/// Snapshot of a batch job.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BatchStatus {
    pub batch_id: String,
    pub status: BatchState,
    pub total: u64,
    pub processed: u64,
    pub successful: u64,
    pub failed: u64,
    pub current_item_id: Option<String>,
    /// Keyed by compact remote id.
    pub per_item_status: BTreeMap<String, ItemState>,
    /// Compact remote ids in processing order.
    #[serde(skip)]
    pub item_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
impl BatchStatus {
    /// State of `compact_id` in this batch, if it is part of it.
    pub fn item(&self, compact_id: &str) -> Option<ItemState> {
        self.per_item_status.get(compact_id).copied()
    }

    /// The id is still waiting for, or being handled by, an active batch.
    pub fn is_syncing(&self, compact_id: &str) -> bool {
        self.status.is_active() && self.item(compact_id).is_some_and(|s| !s.is_terminal())
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct BatchRow {
    batch_id: String,
    status: String,
    total: i64,
    processed: i64,
    successful: i64,
    failed: i64,
    current_item_id: Option<String>,
    item_ids: String,
    items: String,
    error: Option<String>,
}

fn count(value: i64) -> Result<u64, Error> {
    u64::try_from(value).or_raise(|| ErrorKind::InvalidData("batch counter"))
}

impl TryFrom<BatchRow> for BatchStatus {
    type Error = Error;

    fn try_from(row: BatchRow) -> Result<Self, Self::Error> {
        Ok(Self {
            status: BatchState::parse(&row.status).ok_or_else(|| exn::Exn::from(ErrorKind::InvalidData("batch status")))?,
            total: count(row.total)?,
            processed: count(row.processed)?,
            successful: count(row.successful)?,
            failed: count(row.failed)?,
            current_item_id: row.current_item_id,
            per_item_status: serde_json::from_str(&row.items).or_raise(|| ErrorKind::InvalidData("batch items"))?,
            item_ids: serde_json::from_str(&row.item_ids).or_raise(|| ErrorKind::InvalidData("batch item ids"))?,
            error: row.error,
            batch_id: row.batch_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str, items: &str) -> BatchRow {
        BatchRow {
            batch_id: "b".into(),
            status: status.into(),
            total: 2,
            processed: 1,
            successful: 1,
            failed: 0,
            current_item_id: Some("two".into()),
            item_ids: r#"["one","two"]"#.into(),
            items: items.into(),
            error: None,
        }
    }

    #[test]
    fn test_row_to_model() {
        let batch = BatchStatus::try_from(row("processing", r#"{"one":"success","two":"processing"}"#)).unwrap();
        assert_eq!(batch.item("one"), Some(ItemState::Success));
        assert!(!batch.is_syncing("one"));
        assert!(batch.is_syncing("two"));
        assert!(!batch.is_syncing("three"));
        assert_eq!(batch.item_ids, vec!["one", "two"]);
    }

    #[test]
    fn test_failed_batch_is_not_syncing() {
        let batch = BatchStatus::try_from(row("failed", r#"{"one":"success","two":"queued"}"#)).unwrap();
        assert!(!batch.is_syncing("two"));
        assert_eq!(batch.item("one"), Some(ItemState::Success));
    }

    #[test]
    fn test_bad_items_rejected() {
        assert!(BatchStatus::try_from(row("queued", r#"{"one":"exploded"}"#)).is_err());
        assert!(BatchStatus::try_from(row("paused", "{}")).is_err());
    }

    #[test]
    fn test_serialize_hides_internal_fields() {
        let batch = BatchStatus::try_from(row("queued", r#"{"one":"queued"}"#)).unwrap();
        let json = serde_json::to_value(&batch).unwrap();
        assert_eq!(json["status"], "queued");
        assert_eq!(json["per_item_status"]["one"], "queued");
        assert!(json.get("item_ids").is_none());
        assert!(json.get("error").is_none());
    }
}
