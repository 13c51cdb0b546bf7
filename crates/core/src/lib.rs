// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! marshal-core: domain types for the Marshal profile orchestration engine

pub mod macros;

pub mod clock;
pub mod event;
pub mod frame;
pub mod keypool;
pub mod profile;
pub mod schedule;
pub mod settings;
pub mod state;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, FakeClock, SystemClock};
pub use event::{Envelope, Event, ProfileSnapshot};
pub use frame::{Frame, HostMessage, SessionToken};
pub use keypool::{Credential, CredentialPayload, KeyPool};
#[cfg(any(test, feature = "test-support"))]
pub use profile::ProfileBuilder;
pub use profile::{AccountInfo, Counters, Profile, WindowPos};
pub use schedule::{Period, Schedule, MINUTES_PER_DAY};
pub use settings::Settings;
pub use state::{ProfileState, RuntimeState};
