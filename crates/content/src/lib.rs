//! Local content store boundary.
//!
//! The synchronization core never talks to a CMS directly. It creates and
//! updates [`ContentRecord`]s through a [`ContentStore`], and maintains
//! navigation through a [`MenuStore`]. The SQLite implementation lives in
//! `tether-db`; [`MemoryStore`] (feature `mock`) is for tests.

pub mod error;
pub mod models;
mod store;

pub use crate::models::{ContentRecord, ContentStatus, ContentUpdate, Menu, MenuItem, NewContent, NewMenuItem, Origin, Placement};
#[cfg(feature = "mock")]
pub use crate::store::MemoryStore;
pub use crate::store::{ContentStore, MenuStore, permalink};
use std::sync::Arc;

pub type ContentHandle = Arc<dyn ContentStore + Send + Sync>;
pub type MenuHandle = Arc<dyn MenuStore + Send + Sync>;

/// Meta key holding the compact remote id a record was synced from.
pub const META_REMOTE_ID: &str = "_tether_remote_id";
/// Meta key holding the remote id of the record's remote parent, as the
/// remote source reported it (either spelling).
pub const META_PARENT_REMOTE_ID: &str = "_tether_parent_remote_id";
/// Meta key holding the remote last-edited time (unix seconds).
pub const META_REMOTE_LAST_EDITED: &str = "_tether_remote_last_edited";
