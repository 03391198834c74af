mod batch;
mod entry;

pub use self::batch::{BatchState, BatchStatus, ItemState};
pub(crate) use self::batch::BatchRow;
pub(crate) use self::entry::EntryRow;
pub use self::entry::{RegistryEntry, SyncState};
