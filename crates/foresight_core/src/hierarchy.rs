//! Parent -> children index over one store snapshot.
//!
//! # Responsibility
//! - Build child adjacency on demand from `parent_id` links.
//! - Enumerate direct children, full subtrees and ancestor chains.
//!
//! # Invariants
//! - The index is rebuilt from a snapshot per operation, never patched.
//! - Traversals use an explicit work list plus a visited set, so a cyclic
//!   parent graph is reported as `CyclicHierarchy` instead of looping.
//! - Child lists are ordered by id for deterministic output.

use crate::model::item::{Item, ItemId};
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from hierarchy traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HierarchyError {
    /// Traversal reached `item_id` twice.
    CyclicHierarchy(ItemId),
}

impl Display for HierarchyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CyclicHierarchy(id) => write!(f, "cyclic hierarchy detected at item {id}"),
        }
    }
}

impl Error for HierarchyError {}

/// Arena of items keyed by id plus derived child adjacency.
#[derive(Debug, Clone, Default)]
pub struct HierarchyIndex {
    items: HashMap<ItemId, Item>,
    children: HashMap<ItemId, Vec<ItemId>>,
}

impl HierarchyIndex {
    /// Builds the index from a snapshot. Later duplicates of one id win.
    pub fn build(items: impl IntoIterator<Item = Item>) -> Self {
        let items: HashMap<ItemId, Item> = items
            .into_iter()
            .map(|item| (item.id.clone(), item))
            .collect();

        let mut children: HashMap<ItemId, Vec<ItemId>> = HashMap::new();
        for item in items.values() {
            if let Some(parent_id) = &item.parent_id {
                children
                    .entry(parent_id.clone())
                    .or_default()
                    .push(item.id.clone());
            }
        }
        for ids in children.values_mut() {
            ids.sort();
        }

        Self { items, children }
    }

    pub fn get(&self, id: &str) -> Option<&Item> {
        self.items.get(id)
    }

    /// Iterates all items in unspecified order.
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    pub fn into_items(self) -> Vec<Item> {
        self.items.into_values().collect()
    }

    /// Items whose `parent_id == id`.
    pub fn children_of(&self, id: &str) -> Vec<&Item> {
        self.child_ids(id)
            .iter()
            .filter_map(|child_id| self.items.get(child_id))
            .collect()
    }

    /// Transitive closure of `children_of`, depth-first, each item once.
    pub fn all_descendants(&self, id: &str) -> Result<Vec<&Item>, HierarchyError> {
        let mut visited: HashSet<&str> = HashSet::new();
        visited.insert(id);

        let mut stack: Vec<&ItemId> = self.child_ids(id).iter().rev().collect();
        let mut descendants = Vec::new();
        while let Some(current) = stack.pop() {
            if !visited.insert(current.as_str()) {
                return Err(HierarchyError::CyclicHierarchy(current.clone()));
            }
            if let Some(item) = self.items.get(current) {
                descendants.push(item);
            }
            stack.extend(self.child_ids(current).iter().rev());
        }
        Ok(descendants)
    }

    /// `all_descendants` restricted to tasks.
    pub fn leaf_descendants(&self, id: &str) -> Result<Vec<&Item>, HierarchyError> {
        let mut leaves = self.all_descendants(id)?;
        leaves.retain(|item| item.is_task());
        Ok(leaves)
    }

    /// Parent chain of `id`, nearest first. Stops at the root or at a
    /// dangling parent reference.
    pub fn ancestors(&self, id: &str) -> Result<Vec<&Item>, HierarchyError> {
        let mut visited: HashSet<&str> = HashSet::new();
        visited.insert(id);

        let mut ancestors = Vec::new();
        let mut cursor = self.items.get(id).and_then(|item| item.parent_id.as_deref());
        while let Some(current) = cursor {
            if !visited.insert(current) {
                return Err(HierarchyError::CyclicHierarchy(current.to_string()));
            }
            let Some(parent) = self.items.get(current) else {
                break;
            };
            ancestors.push(parent);
            cursor = parent.parent_id.as_deref();
        }
        Ok(ancestors)
    }

    fn child_ids(&self, id: &str) -> &[ItemId] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }
}
