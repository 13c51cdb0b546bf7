// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory store for tests and embedding.

use crate::error::StoreError;
use crate::store::{Named, Store};
use indexmap::IndexMap;
use parking_lot::Mutex;

/// Order-preserving in-memory [`Store`].
pub struct MemoryStore<T: Named> {
    entries: Mutex<IndexMap<String, T>>,
}

impl<T: Named> MemoryStore<T> {
    pub fn new() -> Self {
        Self { entries: Mutex::new(IndexMap::new()) }
    }

    /// Seed with entities in the given order.
    pub fn with_entries(entries: impl IntoIterator<Item = T>) -> Self {
        let map = entries.into_iter().map(|e| (e.name().to_string(), e)).collect();
        Self { entries: Mutex::new(map) }
    }
}

impl<T: Named> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Named> Store<T> for MemoryStore<T> {
    fn list(&self) -> Result<Vec<T>, StoreError> {
        Ok(self.entries.lock().values().cloned().collect())
    }

    fn get_by_name(&self, name: &str) -> Result<Option<T>, StoreError> {
        Ok(self.entries.lock().get(name).cloned())
    }

    fn create(&self, entity: T) -> Result<(), StoreError> {
        let mut entries = self.entries.lock();
        let name = entity.name().to_string();
        if entries.contains_key(&name) {
            return Err(StoreError::AlreadyExists(name));
        }
        entries.insert(name, entity);
        Ok(())
    }

    fn update(&self, entity: T) -> Result<(), StoreError> {
        let mut entries = self.entries.lock();
        let name = entity.name().to_string();
        if !entries.contains_key(&name) {
            return Err(StoreError::NotFound(name));
        }
        // Insert on an existing key keeps the entry's position.
        entries.insert(name, entity);
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock();
        entries
            .shift_remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn move_to_index(&self, name: &str, index: usize) -> Result<(), StoreError> {
        let mut entries = self.entries.lock();
        let from = entries
            .get_index_of(name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        if index >= entries.len() {
            return Err(StoreError::IndexOutOfRange { index, len: entries.len() });
        }
        entries.move_index(from, index);
        Ok(())
    }

    fn reload(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
