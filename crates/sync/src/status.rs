use serde::Serialize;
use std::collections::BTreeMap;
use tether_db::{BatchRepository, BatchStatus, LinkRegistry, RegistryEntry};
use tether_ident::normalize;
use tracing::instrument;

/// Human-facing sync status of one remote id.
///
/// Derived on every read from the registry entry and the active batches;
/// never stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CompositeStatus {
    NotSynced,
    Syncing {
        batch_id: String,
        processed: u64,
        total: u64,
        /// `queued` or `processing`.
        item: tether_db::ItemState,
    },
    Synced {
        local_content_id: Option<i64>,
        /// Unix seconds.
        last_synced: Option<i64>,
    },
    Outdated {
        local_content_id: Option<i64>,
        last_synced: Option<i64>,
        remote_last_modified: Option<i64>,
    },
    Failed {
        error: String,
    },
}
impl CompositeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotSynced => "not_synced",
            Self::Syncing { .. } => "syncing",
            Self::Synced { .. } => "synced",
            Self::Outdated { .. } => "outdated",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Answer to a multi-id status query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    /// Keyed by compact remote id.
    pub pages: BTreeMap<String, CompositeStatus>,
    pub batch: Option<BatchStatus>,
}

/// Merges the first matching rule, in priority order: active batch, recorded
/// error, outdated, synced, not synced.
pub fn resolve(entry: Option<&RegistryEntry>, active: &[BatchStatus], compact_id: &str) -> CompositeStatus {
    if let Some(batch) = active.iter().find(|b| b.is_syncing(compact_id)) {
        return CompositeStatus::Syncing {
            batch_id: batch.batch_id.clone(),
            processed: batch.processed,
            total: batch.total,
            item: batch.item(compact_id).unwrap_or(tether_db::ItemState::Queued),
        };
    }
    let Some(entry) = entry else {
        return CompositeStatus::NotSynced;
    };
    if let Some(error) = entry.error() {
        return CompositeStatus::Failed { error: error.to_string() };
    }
    let last_synced = entry.local_last_synced.map(|t| t.unix_timestamp());
    if entry.is_outdated() {
        return CompositeStatus::Outdated {
            local_content_id: entry.local_content_id,
            last_synced,
            remote_last_modified: entry.remote_last_modified.map(|t| t.unix_timestamp()),
        };
    }
    if entry.is_synced() {
        return CompositeStatus::Synced { local_content_id: entry.local_content_id, last_synced };
    }
    CompositeStatus::NotSynced
}

/// Read-only view over the registry and the batch store.
#[derive(Clone, Debug)]
pub struct StatusResolver {
    registry: LinkRegistry,
    batches: BatchRepository,
}

impl StatusResolver {
    pub fn new(registry: LinkRegistry, batches: BatchRepository) -> Self {
        Self { registry, batches }
    }

    /// Active batches. An unreadable batch store counts as having none.
    async fn active(&self) -> Vec<BatchStatus> {
        self.batches.list_active().await.unwrap_or_else(|e| {
            tracing::warn!(error = %(*e), "could not read active batches");
            Vec::new()
        })
    }

    pub async fn status_for(&self, remote_id: &str) -> CompositeStatus {
        let (compact, _) = normalize(remote_id);
        let entry = self.registry.find_by_remote_id(&compact).await;
        resolve(entry.as_ref(), &self.active().await, &compact)
    }

    /// Statuses for several ids, plus the given batch if it exists.
    #[instrument(skip_all, fields(ids = ids.len()))]
    pub async fn status_for_many(&self, ids: &[String], batch_id: Option<&str>) -> StatusReport {
        let active = self.active().await;
        let mut pages = BTreeMap::new();
        for id in ids {
            let (compact, _) = normalize(id);
            if compact.is_empty() || pages.contains_key(&compact) {
                continue;
            }
            let entry = self.registry.find_by_remote_id(&compact).await;
            let status = resolve(entry.as_ref(), &active, &compact);
            pages.insert(compact, status);
        }
        let batch = match batch_id {
            Some(batch_id) => self.batches.get(batch_id).await.unwrap_or_else(|e| {
                tracing::warn!(batch_id, error = %(*e), "could not read batch");
                None
            }),
            None => None,
        };
        StatusReport { pages, batch }
    }
}
