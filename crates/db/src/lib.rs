//! SQLite persistence for tether.
//!
//! One database file holds three concerns:
//! - the [`LinkRegistry`]: one row per remote resource ever seen, mapping its
//!   remote id to a public slug, its local content and its sync state;
//! - the [`BatchRepository`]: bulk sync jobs and their per-item progress;
//! - optionally, local content and menus through [`SqliteContentStore`].
//!
//! Timestamps are stored as unix seconds.

mod batch;
mod content;
mod db;
pub mod error;
pub mod models;
mod registry;
pub mod slug;

pub use crate::batch::BatchRepository;
pub use crate::content::SqliteContentStore;
pub use crate::db::Database;
pub use crate::models::{BatchState, BatchStatus, ItemState, RegistryEntry, SyncState};
pub use crate::registry::{LinkRegistry, Registration};
