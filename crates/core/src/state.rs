// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Profile supervision states and the transition table.

use serde::{Deserialize, Serialize};

/// Supervision state of a managed profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileState {
    /// Not supervised; no process, no key.
    Stopped,
    /// Supervision task launched; process not yet confirmed running.
    Starting,
    /// Process launched and under heartbeat surveillance.
    Running,
    /// Stop requested; cleanup in progress.
    Stopping,
    /// Terminal failure; key released, schedule may have been disabled.
    Error,
}

impl ProfileState {
    /// Whether the state machine permits the `self -> to` edge.
    ///
    /// Only listed edges are legal; any other attempt is refused without
    /// side effect by the runtime state store.
    pub fn can_transition(self, to: ProfileState) -> bool {
        use ProfileState::*;
        matches!(
            (self, to),
            (Stopped, Starting)
                | (Starting, Running)
                | (Starting, Error)
                | (Running, Stopping)
                | (Running, Error)
                | (Stopping, Stopped)
                | (Error, Starting)
                | (Error, Stopping)
                | (Error, Stopped)
        )
    }

    /// True while a supervision task may be alive for this profile.
    pub fn is_active(self) -> bool {
        matches!(self, ProfileState::Starting | ProfileState::Running | ProfileState::Stopping)
    }
}

crate::simple_display! {
    ProfileState {
        Stopped => "stopped",
        Starting => "starting",
        Running => "running",
        Stopping => "stopping",
        Error => "error",
    }
}

/// Transient, in-memory supervision record for one profile.
///
/// The live process handle and the cancellation signal are engine-local;
/// this record carries only the serializable view (with `pid` standing in
/// for the handle) so it can ride on state-changed events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeState {
    pub state: ProfileState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    /// Last thing the runtime reported (free-form).
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    /// Null until the first heartbeat of the current run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_heartbeat_ms: Option<u64>,
    /// Consecutive crashes of the current supervision run; zeroed once the
    /// run proves healthy (first heartbeat) and on a fresh operator start.
    #[serde(default)]
    pub crash_count: u32,
    /// Zeroed on every heartbeat.
    #[serde(default)]
    pub missed_heartbeats: u32,
    /// Name of the credential currently assigned, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_key: Option<String>,
}

impl RuntimeState {
    pub fn new() -> Self {
        Self {
            state: ProfileState::Stopped,
            pid: None,
            status: String::new(),
            started_at_ms: None,
            last_heartbeat_ms: None,
            crash_count: 0,
            missed_heartbeats: 0,
            assigned_key: None,
        }
    }
}

impl Default for RuntimeState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
