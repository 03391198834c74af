//! Projection of a page tree onto a navigation menu.

use crate::error::{ErrorKind, Result};
use crate::tree::HierarchyNode;
use exn::ResultExt;
use std::collections::{HashMap, HashSet};
use tether_content::{MenuHandle, MenuItem, NewMenuItem, Origin, Placement};
use tracing::instrument;

/// What one menu synchronization changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MenuSummary {
    pub menu_id: i64,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

/// Keeps the system-managed part of a menu in step with a page tree.
///
/// Only items this synchronizer created ([`Origin::System`]) are ever moved,
/// renamed or deleted. Manual items are left exactly where they are, and a
/// manual item pointing at a synced page is never adopted.
#[derive(Clone)]
pub struct MenuSynchronizer {
    menus: MenuHandle,
}

impl MenuSynchronizer {
    pub fn new(menus: MenuHandle) -> Self {
        Self { menus }
    }

    /// Make the system-managed items of `menu_name` mirror `tree`, creating
    /// the menu if needed. With `include_root`, the root page is the single
    /// top-level item; otherwise its children are.
    #[instrument(skip(self, tree), fields(root = %tree.remote_id))]
    pub async fn sync_menu(&self, menu_name: &str, tree: &HierarchyNode, include_root: bool) -> Result<MenuSummary> {
        let menu = match self.menus.find_menu(menu_name).await.or_raise(|| ErrorKind::Menu)? {
            Some(menu) => menu,
            None => {
                tracing::info!(menu = menu_name, "creating menu");
                self.menus.create_menu(menu_name).await.or_raise(|| ErrorKind::Menu)?
            },
        };
        let mut summary = MenuSummary { menu_id: menu.id, ..Default::default() };

        let top: Vec<&HierarchyNode> = if include_root { vec![tree] } else { tree.children.iter().collect() };
        let wanted: HashSet<i64> = top.iter().flat_map(|n| n.local_ids()).collect();

        // Existing system items by content; stale ones and duplicates go.
        let items = self.menus.items(menu.id).await.or_raise(|| ErrorKind::Menu)?;
        let parents: HashMap<i64, Option<i64>> = items.iter().map(|i| (i.id, i.parent_id)).collect();
        let mut existing: HashMap<i64, MenuItem> = HashMap::new();
        let mut stale = Vec::new();
        let mut manual = Vec::new();
        for item in items {
            if item.origin != Origin::System {
                manual.push(item);
                continue;
            }
            match item.local_content_id {
                Some(content) if wanted.contains(&content) && !existing.contains_key(&content) => {
                    existing.insert(content, item);
                },
                _ => stale.push(item),
            }
        }

        // Manual items nested under a stale item stay at the same place in
        // the surviving part of the menu.
        let stale_ids: HashSet<i64> = stale.iter().map(|i| i.id).collect();
        for item in manual.into_iter().filter(|i| i.parent_id.is_some_and(|p| stale_ids.contains(&p))) {
            let parent_id = surviving_ancestor(item.parent_id, &parents, &stale_ids);
            tracing::debug!(item = item.id, ?parent_id, "moving manual item off a stale parent");
            let placement = Placement { parent_id, order: item.order, title: item.title };
            self.menus.update_item(item.id, placement).await.or_raise(|| ErrorKind::Menu)?;
        }

        for item in stale {
            tracing::debug!(item = item.id, title = %item.title, "deleting stale menu item");
            self.menus.delete_item(item.id).await.or_raise(|| ErrorKind::Menu)?;
            summary.deleted += 1;
        }

        // Depth-first so every parent item exists before its children.
        let mut pending: Vec<(Option<i64>, i64, &HierarchyNode)> =
            top.iter().enumerate().rev().map(|(i, n)| (None, sibling_order(i), *n)).collect();
        while let Some((parent_id, order, node)) = pending.pop() {
            let placement = Placement { parent_id, order, title: node.title.clone() };
            let item_id = match existing.get(&node.local_id) {
                Some(item) => {
                    if (item.parent_id, item.order, &item.title) != (placement.parent_id, placement.order, &placement.title) {
                        self.menus.update_item(item.id, placement).await.or_raise(|| ErrorKind::Menu)?;
                        summary.updated += 1;
                    }
                    item.id
                },
                None => {
                    let new = NewMenuItem {
                        parent_id,
                        local_content_id: Some(node.local_id),
                        title: placement.title,
                        order,
                        origin: Origin::System,
                    };
                    summary.created += 1;
                    self.menus.create_item(menu.id, new).await.or_raise(|| ErrorKind::Menu)?
                },
            };
            for (i, child) in node.children.iter().enumerate().rev() {
                pending.push((Some(item_id), sibling_order(i), child));
            }
        }

        tracing::info!(
            menu = menu_name,
            created = summary.created,
            updated = summary.updated,
            deleted = summary.deleted,
            "menu synchronized",
        );
        Ok(summary)
    }
}

/// Nearest item above `parent_id` (itself included) that is not being deleted.
fn surviving_ancestor(
    mut parent_id: Option<i64>,
    parents: &HashMap<i64, Option<i64>>,
    stale: &HashSet<i64>,
) -> Option<i64> {
    let mut seen = HashSet::new();
    while let Some(id) = parent_id {
        if !stale.contains(&id) || !seen.insert(id) {
            break;
        }
        parent_id = parents.get(&id).copied().flatten();
    }
    parent_id.filter(|id| !stale.contains(id))
}

fn sibling_order(index: usize) -> i64 {
    i64::try_from(index).unwrap_or(i64::MAX)
}
