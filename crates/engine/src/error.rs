// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error type.
//!
//! Precondition violations are typed refusals: the state they describe is
//! untouched. Collaborator failures wrap the collaborator's own error.

use marshal_adapters::LaunchError;
use marshal_core::ProfileState;
use marshal_storage::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown profile: {0}")]
    UnknownProfile(String),

    #[error("{name}: illegal transition {from} -> {to}")]
    IllegalTransition {
        name: String,
        from: ProfileState,
        to: ProfileState,
    },

    #[error("profile {0} has no key pool")]
    NoKeyPool(String),

    #[error("no available key in pool {0}")]
    NoAvailableKeys(String),

    #[error("key {key} not found in pool {pool}")]
    UnknownKey { pool: String, key: String },

    #[error("profile {0} has no running process")]
    NotRunning(String),

    #[error("profile {0} must be stopped first")]
    Busy(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Launch(#[from] LaunchError),
}
