// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON-file store with atomic replace and rotating backups.
//!
//! The whole entity list is rewritten on every mutation: serialized to a
//! sibling temp file, the previous file rotated to `.bak`, then renamed
//! into place. Readers never observe a partial write.

use crate::error::StoreError;
use crate::store::{Named, Store};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

const MAX_BAK_FILES: u32 = 3;

/// Pick the next `.bak` / `.bak.N` path, rotating older backups out.
///
/// Keeps up to [`MAX_BAK_FILES`] backups: `.bak`, `.bak.2`, `.bak.3`.
/// The oldest backup is removed when the limit is reached.
fn rotate_bak_path(path: &Path) -> PathBuf {
    let bak = |n: u32| {
        if n == 1 {
            path.with_extension("bak")
        } else {
            path.with_extension(format!("bak.{n}"))
        }
    };

    let oldest = bak(MAX_BAK_FILES);
    if oldest.exists() {
        let _ = fs::remove_file(&oldest);
    }

    for n in (1..MAX_BAK_FILES).rev() {
        let src = bak(n);
        if src.exists() {
            let _ = fs::rename(&src, bak(n + 1));
        }
    }

    bak(1)
}

/// File-backed [`Store`] keeping one JSON array per entity kind.
pub struct JsonStore<T: Named> {
    path: PathBuf,
    entries: Mutex<IndexMap<String, T>>,
}

impl<T> JsonStore<T>
where
    T: Named + Serialize + DeserializeOwned,
{
    /// Open a store at `path`, loading existing content if present.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = Mutex::new(Self::read_entries(&path)?);
        Ok(Self { path, entries })
    }

    fn read_entries(path: &Path) -> Result<IndexMap<String, T>, StoreError> {
        if !path.exists() {
            return Ok(IndexMap::new());
        }
        let content = fs::read_to_string(path)?;
        let list: Vec<T> = serde_json::from_str(&content)?;
        Ok(list.into_iter().map(|e| (e.name().to_string(), e)).collect())
    }

    /// Serialize the current list and atomically replace the file.
    fn persist(&self, entries: &IndexMap<String, T>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let list: Vec<&T> = entries.values().collect();
        let content = serde_json::to_string_pretty(&list)?;

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, content)?;
        if self.path.exists() {
            let _ = fs::rename(&self.path, rotate_bak_path(&self.path));
        }
        fs::rename(&tmp, &self.path)?;

        tracing::debug!(path = %self.path.display(), entries = entries.len(), "persisted store");
        Ok(())
    }
}

impl<T> Store<T> for JsonStore<T>
where
    T: Named + Serialize + DeserializeOwned,
{
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
        self.persist(&entries)
    }

    fn update(&self, entity: T) -> Result<(), StoreError> {
        let mut entries = self.entries.lock();
        let name = entity.name().to_string();
        if !entries.contains_key(&name) {
            return Err(StoreError::NotFound(name));
        }
        entries.insert(name, entity);
        self.persist(&entries)
    }

    fn delete(&self, name: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock();
        if entries.shift_remove(name).is_none() {
            return Err(StoreError::NotFound(name.to_string()));
        }
        self.persist(&entries)
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
        self.persist(&entries)
    }

    fn reload(&self) -> Result<(), StoreError> {
        let fresh = Self::read_entries(&self.path)?;
        *self.entries.lock() = fresh;
        Ok(())
    }
}

#[cfg(test)]
#[path = "json_tests.rs"]
mod tests;
