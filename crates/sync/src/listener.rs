//! Extension points around a sync.

use crate::error::ErrorKind;
use tether_db::RegistryEntry;

/// Observer registered with the orchestrator at construction.
///
/// Called synchronously once a sync has finished, after every write.
pub trait SyncListener: Send + Sync {
    fn on_synced(&self, entry: &RegistryEntry);

    fn on_failed(&self, _remote_id: &str, _error: &ErrorKind) {}
}

/// Logs every outcome through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogListener;

impl SyncListener for LogListener {
    fn on_synced(&self, entry: &RegistryEntry) {
        tracing::info!(
            remote_id = %entry.remote_id_compact,
            slug = %entry.slug,
            local_content_id = ?entry.local_content_id,
            "synced",
        );
    }

    fn on_failed(&self, remote_id: &str, error: &ErrorKind) {
        tracing::warn!(remote_id, %error, retryable = error.is_retryable(), "sync failed");
    }
}
