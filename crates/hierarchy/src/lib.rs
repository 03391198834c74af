//! Page hierarchy and navigation.
//!
//! Synced records carry their remote parent as metadata. [`HierarchyBuilder`]
//! turns those flat parent pointers back into a tree, and
//! [`MenuSynchronizer`] projects that tree onto a navigation menu.

pub mod error;
mod menu;
mod tree;

pub use crate::menu::{MenuSummary, MenuSynchronizer};
pub use crate::tree::{DEFAULT_MAX_DEPTH, DEFAULT_MAX_ROOT_ITERATIONS, HierarchyBuilder, HierarchyNode, ParentIndex};
