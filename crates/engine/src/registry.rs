// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session token registry: frame sender to profile name.
//!
//! Maintained at launch time by the supervisor; the lock is held only
//! across insert/remove/lookup.

use marshal_core::SessionToken;
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Default)]
pub struct SessionRegistry {
    entries: Mutex<HashMap<SessionToken, String>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, token: SessionToken, profile: &str) {
        self.entries.lock().insert(token, profile.to_string());
    }

    pub fn remove(&self, token: SessionToken) {
        self.entries.lock().remove(&token);
    }

    /// Drop every token pointing at `profile`.
    pub fn remove_profile(&self, profile: &str) {
        self.entries.lock().retain(|_, name| name != profile);
    }

    pub fn resolve(&self, token: SessionToken) -> Option<String> {
        self.entries.lock().get(&token).cloned()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
