// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transport frames pushed at the engine by the message-transport collaborator.
//!
//! The wire format is the collaborator's business; the engine only sees
//! decoded `Frame`s and addresses replies through the launch collaborator's
//! `send_message`.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Per-launch address token.
///
/// Generated by the engine at launch, passed to the launch collaborator as
/// the host announce token, and echoed back as the sender of every frame
/// from that process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(Uuid);

impl SessionToken {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One message from a running process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub sender: SessionToken,
    pub function: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Frame {
    pub fn new(sender: SessionToken, function: impl Into<String>, args: Vec<String>) -> Self {
        Self { sender, function: function.into(), args }
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }
}

/// Typed selector for host-to-runtime messages.
///
/// The launch collaborator maps these onto whatever numeric message types
/// its channel uses; [`HostMessage::code`] is the stable mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostMessage {
    /// Handle announce; solicits a first heartbeat after launch.
    Announce,
    /// Profile configuration read-back.
    Profile,
    /// Launch/game information read-back.
    GameInfo,
    /// Reply to a key/value cache retrieve.
    CacheValue,
    /// Chat text relayed into the runtime.
    Chat,
}

impl HostMessage {
    pub fn code(self) -> u32 {
        match self {
            HostMessage::Announce => 1,
            HostMessage::Profile => 2,
            HostMessage::GameInfo => 3,
            HostMessage::CacheValue => 4,
            HostMessage::Chat => 5,
        }
    }
}

crate::simple_display! {
    HostMessage {
        Announce => "announce",
        Profile => "profile",
        GameInfo => "game_info",
        CacheValue => "cache_value",
        Chat => "chat",
    }
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
