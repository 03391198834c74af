//! Remote → local synchronization.
//!
//! - [`SyncOrchestrator`] pulls one remote document into the local content
//!   store and records the outcome in the link registry.
//! - [`StatusResolver`] derives the human-facing status of remote ids from
//!   the registry and the active batch jobs.
//! - [`run_batch`] is the worker that syncs a queued batch one id at a time.

mod batch;
pub mod convert;
pub mod error;
mod listener;
mod orchestrate;
mod status;

pub use crate::batch::{BatchEvent, run_batch};
pub use crate::listener::{LogListener, SyncListener};
pub use crate::orchestrate::{SyncOrchestrator, SyncReport, SyncSettings};
pub use crate::status::{CompositeStatus, StatusReport, StatusResolver, resolve};
