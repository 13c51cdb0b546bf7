// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Settings persistence: a single TOML document.

use crate::error::StoreError;
use marshal_core::Settings;
use parking_lot::Mutex;
use std::fs;
use std::path::PathBuf;

/// Persistence for the single settings document.
pub trait SettingsStore: Send + Sync {
    fn load(&self) -> Result<Settings, StoreError>;
    fn save(&self, settings: &Settings) -> Result<(), StoreError>;
}

/// In-memory settings for tests and embedding.
pub struct MemorySettingsStore {
    inner: Mutex<Settings>,
}

impl MemorySettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self { inner: Mutex::new(settings) }
    }
}

impl Default for MemorySettingsStore {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Result<Settings, StoreError> {
        Ok(self.inner.lock().clone())
    }

    fn save(&self, settings: &Settings) -> Result<(), StoreError> {
        *self.inner.lock() = settings.clone();
        Ok(())
    }
}

/// TOML-file settings store. A missing file yields the shipped defaults.
pub struct TomlSettingsStore {
    path: PathBuf,
}

impl TomlSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SettingsStore for TomlSettingsStore {
    fn load(&self) -> Result<Settings, StoreError> {
        if !self.path.exists() {
            return Ok(Settings::default());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(toml::from_str(&content)?)
    }

    fn save(&self, settings: &Settings) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(settings)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
