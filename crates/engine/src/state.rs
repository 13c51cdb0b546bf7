// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime state store: one slot per registered profile.
//!
//! The slot is the only path that mutates a profile's supervision state,
//! and `try_transition` is the only path that moves `state`. Each slot has
//! its own lock; no lock spans more than one profile and none is held
//! across await points.

use marshal_adapters::ProcessHandle;
use marshal_core::{ProfileState, RuntimeState};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Supervision slot for one profile. The serializable view lives in
/// `runtime`; the process handle, the cancellation signal, and the task
/// handle are engine-local.
#[derive(Default)]
pub(crate) struct Slot {
    pub runtime: RuntimeState,
    pub handle: Option<Arc<dyn ProcessHandle>>,
    pub cancel: Option<CancellationToken>,
    pub task: Option<JoinHandle<()>>,
}

/// Per-profile runtime state with the transition guard.
#[derive(Default)]
pub struct StateStore {
    slots: RwLock<HashMap<String, Arc<Mutex<Slot>>>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a profile with a fresh `Stopped` slot. Returns false when
    /// already registered.
    pub fn register(&self, name: &str) -> bool {
        let mut slots = self.slots.write();
        if slots.contains_key(name) {
            return false;
        }
        slots.insert(name.to_string(), Arc::new(Mutex::new(Slot::default())));
        true
    }

    /// Remove a profile's slot, returning its cancellation token and task
    /// so the caller can finish off a live supervision run.
    pub(crate) fn unregister(
        &self,
        name: &str,
    ) -> Option<(Option<CancellationToken>, Option<JoinHandle<()>>)> {
        let slot = self.slots.write().remove(name)?;
        let mut slot = slot.lock();
        Some((slot.cancel.take(), slot.task.take()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.read().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.slots.read().keys().cloned().collect()
    }

    fn slot(&self, name: &str) -> Option<Arc<Mutex<Slot>>> {
        self.slots.read().get(name).cloned()
    }

    /// Atomically apply `to` if the transition table allows it from the
    /// current state. Returns false without mutation otherwise.
    pub fn try_transition(&self, name: &str, to: ProfileState) -> bool {
        let Some(slot) = self.slot(name) else {
            return false;
        };
        let mut slot = slot.lock();
        if !slot.runtime.state.can_transition(to) {
            return false;
        }
        tracing::debug!(profile = name, from = %slot.runtime.state, to = %to, "state transition");
        slot.runtime.state = to;
        true
    }

    /// Set the state unconditionally. Reserved for `stop(force = true)`.
    pub fn force_state(&self, name: &str, to: ProfileState) -> bool {
        let Some(slot) = self.slot(name) else {
            return false;
        };
        slot.lock().runtime.state = to;
        true
    }

    /// Serialized per-profile mutation of the runtime record.
    pub fn update<R>(&self, name: &str, f: impl FnOnce(&mut RuntimeState) -> R) -> Option<R> {
        let slot = self.slot(name)?;
        let mut slot = slot.lock();
        Some(f(&mut slot.runtime))
    }

    /// Serialized access to the whole slot, handle and signals included.
    pub(crate) fn with_slot<R>(&self, name: &str, f: impl FnOnce(&mut Slot) -> R) -> Option<R> {
        let slot = self.slot(name)?;
        let mut slot = slot.lock();
        Some(f(&mut slot))
    }

    /// Consistent copy of one profile's runtime record.
    pub fn snapshot(&self, name: &str) -> Option<RuntimeState> {
        let slot = self.slot(name)?;
        let slot = slot.lock();
        Some(slot.runtime.clone())
    }

    /// Consistent copies of every registered profile's runtime record.
    pub fn snapshot_all(&self) -> HashMap<String, RuntimeState> {
        let slots = self.slots.read();
        slots
            .iter()
            .map(|(name, slot)| (name.clone(), slot.lock().runtime.clone()))
            .collect()
    }

    /// Names of credentials currently assigned among `names`.
    pub fn assigned_keys(&self, names: &[String]) -> Vec<String> {
        names
            .iter()
            .filter_map(|name| self.snapshot(name).and_then(|rt| rt.assigned_key))
            .collect()
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
