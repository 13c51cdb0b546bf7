// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Round-robin credential allocation.
//!
//! The allocator holds only the per-pool cursor; which credential is in
//! use is computed by the caller from the runtime state store immediately
//! before each call, and the returned name must be assigned into the
//! target runtime state while still on the caller's serialized mutation
//! path. The cursor advances past every grant so usage spreads evenly
//! over time.

use marshal_core::{Credential, KeyPool};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

/// Per-pool round-robin cursors.
#[derive(Default)]
pub struct KeyAllocator {
    cursors: Mutex<HashMap<String, usize>>,
}

impl KeyAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next credential in `pool` that is neither held nor in `in_use`,
    /// scanning from the pool's cursor. `None` when nothing qualifies.
    pub fn acquire(&self, pool: &KeyPool, in_use: &HashSet<String>) -> Option<Credential> {
        if pool.is_empty() {
            return None;
        }
        let mut cursors = self.cursors.lock();
        let cursor = cursors.entry(pool.name.clone()).or_insert(0);
        let len = pool.credentials.len();

        for offset in 0..len {
            let index = (*cursor + offset) % len;
            let credential = &pool.credentials[index];
            if credential.held || in_use.contains(&credential.name) {
                continue;
            }
            *cursor = (index + 1) % len;
            return Some(credential.clone());
        }
        None
    }
}

#[cfg(test)]
#[path = "keypool_tests.rs"]
mod tests;
