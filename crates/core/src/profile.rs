// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistent profile configuration.
//!
//! A profile is the unit of orchestration: one managed external process
//! with its launch configuration, optional key pool and schedule bindings,
//! and accumulated statistics. The engine owns the update semantics of the
//! counters; the persistence collaborator owns their durability.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Window placement for a managed process, in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowPos {
    pub x: i32,
    pub y: i32,
}

/// Login identity the runtime presents once in game.
///
/// These are the fields a `setProfile` transport frame rewrites; the engine
/// stores them opaquely and hands them back on `getProfile`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    #[serde(default)]
    pub account: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub character: String,
    #[serde(default)]
    pub realm: String,
    #[serde(default)]
    pub difficulty: String,
    #[serde(default)]
    pub info_tag: String,
}

/// Monotone per-profile statistics.
///
/// Cleared only by the explicit reset operation; otherwise counters only
/// increase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    #[serde(default)]
    pub runs: u64,
    #[serde(default)]
    pub aborts: u64,
    #[serde(default)]
    pub deaths: u64,
    #[serde(default)]
    pub crashes: u64,
    #[serde(default)]
    pub restarts: u64,
}

/// A persistently configured, managed external process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Unique identifier; stable across renames only via the explicit
    /// rename operation.
    pub name: String,
    pub executable: PathBuf,
    #[serde(default)]
    pub arguments: String,
    /// Name of the key pool to draw credentials from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_pool: Option<String>,
    /// Name of the activation schedule, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    #[serde(default)]
    pub schedule_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<WindowPos>,
    #[serde(default = "default_visible")]
    pub visible: bool,
    /// Display grouping; ordering within the persisted list is global.
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub account: AccountInfo,
    #[serde(default)]
    pub counters: Counters,
}

fn default_visible() -> bool {
    true
}

crate::builder! {
    pub struct ProfileBuilder => Profile {
        into {
            name: String = "p1",
            arguments: String = "",
            executable: PathBuf = "/usr/bin/true",
            group: String = "",
        }
        set {
            schedule_enabled: bool = false,
            visible: bool = true,
        }
        option {
            key_pool: String = None,
            schedule: String = None,
            window: WindowPos = None,
        }
        computed {
            account: AccountInfo = AccountInfo::default(),
            counters: Counters = Counters::default(),
        }
    }
}

#[cfg(test)]
#[path = "profile_tests.rs"]
mod tests;
