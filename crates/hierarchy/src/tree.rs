//! Page tree reconstruction from parent pointers stored on local content.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::collections::{HashMap, HashSet, VecDeque};
use tether_content::{ContentHandle, ContentRecord, META_PARENT_REMOTE_ID, META_REMOTE_ID};
use tether_ident::RemoteId;
use tracing::instrument;

pub const DEFAULT_MAX_DEPTH: usize = 10;
pub const DEFAULT_MAX_ROOT_ITERATIONS: usize = 50;

/// One synced page and its synced sub-pages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HierarchyNode {
    pub local_id: i64,
    pub remote_id: RemoteId,
    pub title: String,
    pub order: i64,
    pub children: Vec<HierarchyNode>,
}
impl HierarchyNode {
    /// Number of nodes in this subtree, itself included.
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(HierarchyNode::len).sum::<usize>()
    }

    /// Local ids of the subtree, depth-first.
    pub fn local_ids(&self) -> Vec<i64> {
        let mut ids = vec![self.local_id];
        for child in &self.children {
            ids.extend(child.local_ids());
        }
        ids
    }
}

struct Slot {
    local_id: i64,
    remote_id: RemoteId,
    parent: Option<RemoteId>,
    title: String,
    order: i64,
}

/// Every synced record, indexed by remote id and by parent remote id.
///
/// Built once per operation from a single store query; parent pointers are
/// normalized, so either stored spelling matches.
pub struct ParentIndex {
    slots: Vec<Slot>,
    by_remote: HashMap<RemoteId, usize>,
    children: HashMap<RemoteId, Vec<usize>>,
}

impl ParentIndex {
    pub fn new(mut records: Vec<ContentRecord>) -> Self {
        // Lowest local id wins when several records claim one remote id.
        records.sort_by_key(|r| r.id);
        let mut index = Self { slots: Vec::new(), by_remote: HashMap::new(), children: HashMap::new() };
        for record in records {
            let Some(remote) = record.meta(META_REMOTE_ID).filter(|v| !v.trim().is_empty()) else {
                continue;
            };
            let remote_id = RemoteId::new(remote);
            if index.by_remote.contains_key(&remote_id) {
                tracing::warn!(%remote_id, local_id = record.id, "ignoring duplicate local record");
                continue;
            }
            let parent = record.meta(META_PARENT_REMOTE_ID).filter(|v| !v.trim().is_empty()).map(RemoteId::new);
            let slot = index.slots.len();
            if let Some(parent) = &parent {
                index.children.entry(parent.clone()).or_default().push(slot);
            }
            index.by_remote.insert(remote_id.clone(), slot);
            index.slots.push(Slot {
                local_id: record.id,
                remote_id,
                parent,
                title: record.title,
                order: record.menu_order,
            });
        }
        for siblings in index.children.values_mut() {
            siblings.sort_by(|a, b| {
                let (a, b) = (&index.slots[*a], &index.slots[*b]);
                (a.order, &a.title, a.local_id).cmp(&(b.order, &b.title, b.local_id))
            });
        }
        index
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Breadth-first expansion from `root`, at most `max_depth` levels below
    /// it. A node reachable twice (a cycle) is only expanded the first time.
    pub fn tree(&self, root: &RemoteId, max_depth: usize) -> Option<HierarchyNode> {
        let root = *self.by_remote.get(root)?;
        let mut visited = HashSet::from([root]);
        let mut edges: HashMap<usize, Vec<usize>> = HashMap::new();
        let mut queue = VecDeque::from([(root, 0)]);
        while let Some((slot, depth)) = queue.pop_front() {
            let Some(children) = self.children.get(&self.slots[slot].remote_id) else {
                continue;
            };
            if depth >= max_depth {
                tracing::warn!(remote_id = %self.slots[slot].remote_id, max_depth, "maximum depth reached, tree truncated");
                continue;
            }
            for &child in children {
                if !visited.insert(child) {
                    tracing::warn!(remote_id = %self.slots[child].remote_id, "parent cycle detected");
                    continue;
                }
                edges.entry(slot).or_default().push(child);
                queue.push_back((child, depth + 1));
            }
        }
        Some(self.assemble(root, &mut edges))
    }

    fn assemble(&self, slot: usize, edges: &mut HashMap<usize, Vec<usize>>) -> HierarchyNode {
        let children = edges.remove(&slot).unwrap_or_default();
        let data = &self.slots[slot];
        HierarchyNode {
            local_id: data.local_id,
            remote_id: data.remote_id.clone(),
            title: data.title.clone(),
            order: data.order,
            children: children.into_iter().map(|c| self.assemble(c, edges)).collect(),
        }
    }

    /// Walks parent pointers upward from `start` until a record without a
    /// (locally synced) parent. A cyclic or overlong chain stops at the last
    /// record reached.
    pub fn root_of(&self, start: &RemoteId, max_iterations: usize) -> Option<RemoteId> {
        let mut current = *self.by_remote.get(start)?;
        let mut visited = HashSet::from([current]);
        for _ in 0..max_iterations {
            let Some(parent) = self.slots[current].parent.as_ref().and_then(|p| self.by_remote.get(p)) else {
                return Some(self.slots[current].remote_id.clone());
            };
            if !visited.insert(*parent) {
                tracing::warn!(remote_id = %self.slots[current].remote_id, "parent cycle detected while looking for the root");
                return Some(self.slots[current].remote_id.clone());
            }
            current = *parent;
        }
        tracing::warn!(start = %start, max_iterations, "root not reached within the iteration limit");
        Some(self.slots[current].remote_id.clone())
    }
}

/// Reconstructs page trees from the parent pointers the orchestrator stores on
/// every synced record.
#[derive(Clone)]
pub struct HierarchyBuilder {
    content: ContentHandle,
    max_depth: usize,
    max_root_iterations: usize,
}

impl HierarchyBuilder {
    pub fn new(content: ContentHandle) -> Self {
        Self { content, max_depth: DEFAULT_MAX_DEPTH, max_root_iterations: DEFAULT_MAX_ROOT_ITERATIONS }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_root_iterations(mut self, max_root_iterations: usize) -> Self {
        self.max_root_iterations = max_root_iterations;
        self
    }

    pub async fn index(&self) -> Result<ParentIndex> {
        let records = self.content.find_with_meta(META_REMOTE_ID).await.or_raise(|| ErrorKind::Content)?;
        Ok(ParentIndex::new(records))
    }

    /// The tree of synced pages below `root_remote_id`.
    #[instrument(skip(self))]
    pub async fn build_tree(&self, root_remote_id: &str) -> Result<HierarchyNode> {
        let root = RemoteId::new(root_remote_id);
        let tree = self.index().await?.tree(&root, self.max_depth);
        let tree = tree.ok_or_else(|| exn::Exn::from(ErrorKind::RootNotFound(root.to_string())))?;
        tracing::debug!(nodes = tree.len(), "built tree");
        Ok(tree)
    }

    /// The topmost synced ancestor of `remote_id` (itself if it has none).
    #[instrument(skip(self))]
    pub async fn find_root(&self, remote_id: &str) -> Result<RemoteId> {
        let start = RemoteId::new(remote_id);
        self.index()
            .await?
            .root_of(&start, self.max_root_iterations)
            .ok_or_else(|| exn::Exn::from(ErrorKind::RootNotFound(start.to_string())))
    }
}
