//! In-memory item store.
//!
//! Every write holds the map's write lock for its whole duration, so readers
//! observe either the state before or after one call.

use super::{validate_all, ItemStore, StoreError, StoreResult, WriteBatch};
use crate::model::item::{Item, ItemId};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// `RwLock`-guarded map from item id to item.
#[derive(Debug, Default)]
pub struct MemoryItemStore {
    items: RwLock<HashMap<ItemId, Item>>,
}

impl MemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `items` (later duplicates win).
    pub fn with_items(items: impl IntoIterator<Item = Item>) -> Self {
        let map = items
            .into_iter()
            .map(|item| (item.id.clone(), item))
            .collect();
        Self {
            items: RwLock::new(map),
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // Writers never leave the map half-updated, so a poisoned lock still
    // guards consistent data.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<ItemId, Item>> {
        self.items.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ItemId, Item>> {
        self.items.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ItemStore for MemoryItemStore {
    fn get(&self, id: &str) -> StoreResult<Option<Item>> {
        Ok(self.read().get(id).cloned())
    }

    fn put(&self, item: &Item) -> StoreResult<()> {
        item.validate()?;
        self.write().insert(item.id.clone(), item.clone());
        Ok(())
    }

    fn delete(&self, id: &str) -> StoreResult<()> {
        match self.write().remove(id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    fn all(&self) -> StoreResult<Vec<Item>> {
        Ok(self.read().values().cloned().collect())
    }

    fn replace_all(&self, items: &[Item]) -> StoreResult<()> {
        validate_all(items)?;
        let next: HashMap<ItemId, Item> = items
            .iter()
            .map(|item| (item.id.clone(), item.clone()))
            .collect();
        *self.write() = next;
        Ok(())
    }

    fn apply(&self, batch: &WriteBatch) -> StoreResult<()> {
        validate_all(&batch.upserts)?;

        let mut guard = self.write();
        for id in &batch.removals {
            let upserted = batch.upserts.iter().any(|item| &item.id == id);
            if !upserted && !guard.contains_key(id) {
                return Err(StoreError::NotFound(id.clone()));
            }
        }

        for item in &batch.upserts {
            guard.insert(item.id.clone(), item.clone());
        }
        for id in &batch.removals {
            guard.remove(id);
        }
        Ok(())
    }
}
