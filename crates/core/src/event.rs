// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Events published to observers of the orchestration engine.
//!
//! Every subscriber first receives the four snapshot events, then the
//! incremental stream. Events concerning one profile are delivered in the
//! order their state mutations committed.

use crate::keypool::KeyPool;
use crate::profile::Profile;
use crate::schedule::Schedule;
use crate::settings::Settings;
use crate::state::RuntimeState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A profile together with its runtime state, as carried by snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub profile: Profile,
    pub runtime: RuntimeState,
}

/// An event stamped at publication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub at_ms: u64,
    #[serde(flatten)]
    pub event: Event,
}

/// Events that flow through the bus.
///
/// Serializes with `{"type": "kind:subject", ...fields}` format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    // -- snapshots, delivered once per subscriber at join --
    #[serde(rename = "snapshot:profiles")]
    ProfilesSnapshot { profiles: Vec<ProfileSnapshot> },

    #[serde(rename = "snapshot:key_pools")]
    KeyPoolsSnapshot {
        pools: Vec<KeyPool>,
        /// Derived usage: pool name to names of credentials currently
        /// assigned to some runtime state.
        in_use: BTreeMap<String, Vec<String>>,
    },

    #[serde(rename = "snapshot:schedules")]
    SchedulesSnapshot { schedules: Vec<Schedule> },

    #[serde(rename = "snapshot:settings")]
    SettingsSnapshot { settings: Settings },

    // -- incremental --
    #[serde(rename = "profile:state_changed")]
    ProfileStateChanged {
        name: String,
        runtime: RuntimeState,
        /// Present when the persistent profile itself changed too.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        profile: Option<Profile>,
    },

    #[serde(rename = "log:line")]
    LogLine {
        source: String,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color: Option<u32>,
        /// Structured payload riding along, e.g. a dropped-item record.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attachment: Option<serde_json::Value>,
    },

    /// Self-update payload relayed verbatim; the engine never interprets it.
    #[serde(rename = "update:status")]
    UpdateStatus { payload: serde_json::Value },

    /// The item index reloaded; consumers should re-query their listings.
    #[serde(rename = "entities:changed")]
    EntitiesChanged,

    /// Terminal marker for a subscriber evicted for falling too far behind.
    #[serde(rename = "bus:lagged")]
    Lagged,

    #[serde(rename = "system:shutdown")]
    Shutdown,
}

impl Event {
    /// The profile this event concerns, if it is profile-scoped.
    pub fn profile_name(&self) -> Option<&str> {
        match self {
            Event::ProfileStateChanged { name, .. } => Some(name),
            _ => None,
        }
    }

    /// True for the join-time snapshot variants.
    pub fn is_snapshot(&self) -> bool {
        matches!(
            self,
            Event::ProfilesSnapshot { .. }
                | Event::KeyPoolsSnapshot { .. }
                | Event::SchedulesSnapshot { .. }
                | Event::SettingsSnapshot { .. }
        )
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
