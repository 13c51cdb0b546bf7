// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers and proptest strategies for tests in dependent crates.

use crate::keypool::{Credential, KeyPool};
use crate::schedule::{Period, Schedule};

/// A pool with the given credential names, all unheld, payloads derived
/// from the names.
pub fn pool(name: &str, keys: &[&str]) -> KeyPool {
    KeyPool::new(
        name,
        keys.iter().map(|k| Credential::new(*k, format!("{k}-primary"), format!("{k}-secondary"))).collect(),
    )
}

/// A single-period schedule.
pub fn schedule(name: &str, start: (u8, u8), end: (u8, u8)) -> Schedule {
    Schedule::new(name, vec![Period::new(start.0, start.1, end.0, end.1)])
}

#[cfg(any(test, feature = "proptest"))]
pub mod strategies {
    use super::*;
    use proptest::prelude::*;

    pub fn arb_period() -> impl Strategy<Value = Period> {
        (0u8..24, 0u8..60, 0u8..24, 0u8..60)
            .prop_map(|(sh, sm, eh, em)| Period::new(sh, sm, eh, em))
    }
}
