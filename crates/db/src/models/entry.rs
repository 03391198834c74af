use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use std::fmt;
use std::str::FromStr;
use tether_ident::{RemoteId, RemoteType};
use time::UtcDateTime;

/// Persisted sync flag. Richer states (syncing, outdated, failed) are derived.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncState {
    Synced,
    #[default]
    NotSynced,
}
impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Synced => "synced",
            Self::NotSynced => "not_synced",
        }
    }
}
impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
impl FromStr for SyncState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "synced" => Ok(Self::Synced),
            "not_synced" => Ok(Self::NotSynced),
            _ => exn::bail!(ErrorKind::InvalidData("sync status")),
        }
    }
}

/// One remote resource the registry knows about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistryEntry {
    pub id: i64,
    /// As stored. Rows written by older code paths may hold either spelling
    /// in either column; use [`remote_id`](Self::remote_id) to compare.
    pub remote_id_compact: String,
    pub remote_id_delimited: String,
    pub remote_type: RemoteType,
    pub remote_title: String,
    pub remote_url: String,
    pub slug: String,
    pub sync_status: SyncState,
    pub local_content_id: Option<i64>,
    pub local_content_type: Option<String>,
    pub remote_last_modified: Option<UtcDateTime>,
    pub local_last_synced: Option<UtcDateTime>,
    pub sync_error: Option<String>,
    pub access_count: u64,
    pub last_accessed_at: Option<UtcDateTime>,
    pub created_at: UtcDateTime,
    pub updated_at: UtcDateTime,
}
impl RegistryEntry {
    pub fn remote_id(&self) -> RemoteId {
        RemoteId::new(&self.remote_id_compact)
    }

    pub fn is_synced(&self) -> bool {
        self.sync_status == SyncState::Synced
    }

    /// The remote side changed after the last successful sync.
    pub fn is_outdated(&self) -> bool {
        match (self.remote_last_modified, self.local_last_synced) {
            (Some(remote), Some(local)) => self.is_synced() && remote > local,
            _ => false,
        }
    }

    /// The last recorded sync failure, ignoring blank messages.
    pub fn error(&self) -> Option<&str> {
        self.sync_error.as_deref().filter(|e| !e.trim().is_empty())
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct EntryRow {
    id: i64,
    remote_id_compact: String,
    remote_id_delimited: String,
    remote_type: String,
    remote_title: String,
    remote_url: String,
    slug: String,
    sync_status: String,
    local_content_id: Option<i64>,
    local_content_type: Option<String>,
    remote_last_modified: Option<i64>,
    local_last_synced: Option<i64>,
    sync_error: Option<String>,
    access_count: i64,
    last_accessed_at: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

fn timestamp(value: i64, field: &'static str) -> Result<UtcDateTime, Error> {
    UtcDateTime::from_unix_timestamp(value).or_raise(|| ErrorKind::InvalidData(field))
}

fn optional_timestamp(value: Option<i64>, field: &'static str) -> Result<Option<UtcDateTime>, Error> {
    value.map(|v| timestamp(v, field)).transpose()
}

impl TryFrom<EntryRow> for RegistryEntry {
    type Error = Error;

    fn try_from(row: EntryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            remote_id_compact: row.remote_id_compact,
            remote_id_delimited: row.remote_id_delimited,
            remote_type: row.remote_type.parse::<RemoteType>().or_raise(|| ErrorKind::InvalidData("remote type"))?,
            remote_title: row.remote_title,
            remote_url: row.remote_url,
            slug: row.slug,
            sync_status: row.sync_status.parse::<SyncState>()?,
            local_content_id: row.local_content_id,
            local_content_type: row.local_content_type,
            remote_last_modified: optional_timestamp(row.remote_last_modified, "remote last modified")?,
            local_last_synced: optional_timestamp(row.local_last_synced, "local last synced")?,
            sync_error: row.sync_error,
            access_count: u64::try_from(row.access_count).or_raise(|| ErrorKind::InvalidData("access count"))?,
            last_accessed_at: optional_timestamp(row.last_accessed_at, "last accessed")?,
            created_at: timestamp(row.created_at, "created at")?,
            updated_at: timestamp(row.updated_at, "updated at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn row() -> EntryRow {
        let now = UtcDateTime::now().unix_timestamp();
        EntryRow {
            id: 1,
            remote_id_compact: "0123456789abcdef0123456789abcdef".into(),
            remote_id_delimited: "01234567-89ab-cdef-0123-456789abcdef".into(),
            remote_type: "database".into(),
            remote_title: "Recipes".into(),
            remote_url: String::new(),
            slug: "recipes".into(),
            sync_status: "synced".into(),
            local_content_id: Some(7),
            local_content_type: Some("page".into()),
            remote_last_modified: Some(now - 60),
            local_last_synced: Some(now),
            sync_error: Some("   ".into()),
            access_count: 3,
            last_accessed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_row_to_model() {
        let entry = RegistryEntry::try_from(row()).unwrap();
        assert_eq!(entry.remote_type, RemoteType::Database);
        assert!(entry.is_synced());
        assert!(!entry.is_outdated());
        assert_eq!(entry.error(), None, "blank errors are not errors");
        assert_eq!(entry.remote_id(), RemoteId::new("01234567-89ab-cdef-0123-456789abcdef"));
    }

    #[test]
    fn test_outdated_requires_synced() {
        let mut entry = RegistryEntry::try_from(row()).unwrap();
        let synced = entry.local_last_synced.unwrap();
        entry.remote_last_modified = Some(synced + Duration::seconds(5));
        assert!(entry.is_outdated());
        entry.sync_status = SyncState::NotSynced;
        assert!(!entry.is_outdated());
    }

    #[test]
    fn test_invalid_status_rejected() {
        let mut row = row();
        row.sync_status = "syncing".into();
        assert!(RegistryEntry::try_from(row).is_err());
    }
}
