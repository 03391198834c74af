//! Remote block tree → local markup.

pub mod error;
mod html;

pub use self::html::HtmlConverter;
use self::error::Result;
use std::collections::HashMap;
use tether_ident::RemoteId;
use tether_remote::models::Block;

/// Stateless mapping from a remote block tree to local markup.
pub trait Converter: Send + Sync {
    fn convert(&self, blocks: &[Block], links: &Links) -> Result<String>;
}

/// Where a referenced remote document is published locally.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkTarget {
    pub slug: String,
    pub title: String,
}

/// Public paths of the remote documents a page refers to.
///
/// Links go through the router (`/{prefix}/{slug}`) rather than straight to
/// local permalinks, so they keep working whether or not the target has been
/// synced yet.
#[derive(Clone, Debug, Default)]
pub struct Links {
    prefix: String,
    targets: HashMap<RemoteId, LinkTarget>,
}
impl Links {
    pub fn new(prefix: impl AsRef<str>) -> Self {
        Self { prefix: prefix.as_ref().trim_matches('/').to_string(), targets: HashMap::new() }
    }

    pub fn insert(&mut self, id: RemoteId, target: LinkTarget) {
        self.targets.insert(id, target);
    }

    pub fn get(&self, id: &RemoteId) -> Option<&LinkTarget> {
        self.targets.get(id)
    }

    pub fn href(&self, id: &RemoteId) -> Option<String> {
        self.get(id).map(|t| format!("/{}/{}", self.prefix, t.slug))
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
