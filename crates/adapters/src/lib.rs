// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! marshal-adapters: external collaborator contracts and implementations.
//!
//! The engine talks to the outside world through the [`Launcher`] contract
//! (process creation, termination, window control, host-to-runtime
//! messages) and the [`LocalCallerCheck`] predicate. A plain
//! `tokio::process` launcher ships for headless hosts; platform-specific
//! launchers (injection, window management) implement the same trait
//! elsewhere.

pub mod launch;
pub mod local;
pub mod process;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeLauncher, LaunchBehavior, SentMessage};
pub use launch::{LaunchError, LaunchSpec, Launcher, ProcessHandle};
pub use local::{LocalCallerCheck, LoopbackCallerCheck};
pub use process::LocalLauncher;
