// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared harness for engine tests: memory stores, fake launcher, fast
//! timings.

use crate::orchestrator::{EngineDeps, Orchestrator};
use marshal_adapters::FakeLauncher;
use marshal_core::{Clock, KeyPool, Profile, ProfileState, Schedule, Settings};
use marshal_storage::{MemorySettingsStore, MemoryStore};
use std::sync::Arc;
use std::time::Duration;

/// Timings tightened so supervision scenarios settle in tens of
/// milliseconds. Heartbeat surveillance stays at its shipped pace; tests
/// that exercise it bring their own settings.
pub(crate) fn fast_settings() -> Settings {
    Settings {
        heartbeat_timeout_ms: 60_000,
        heartbeat_poll_ms: 10_000,
        max_missed_heartbeats: 3,
        monitor_poll_ms: 5,
        max_crash_retries: 5,
        crash_backoff_ms: 10,
        graceful_stop_ms: 50,
        launch_ready_ms: 1_000,
        schedule_tick_ms: 60_000,
        log_ring_capacity: 1_000,
        subscriber_backlog_limit: 1_000,
    }
}

pub(crate) struct Harness<C: Clock> {
    pub orch: Orchestrator<FakeLauncher, C>,
    pub launcher: Arc<FakeLauncher>,
    pub profiles: Arc<MemoryStore<Profile>>,
    pub key_pools: Arc<MemoryStore<KeyPool>>,
    pub schedules: Arc<MemoryStore<Schedule>>,
}

pub(crate) fn harness_with<C: Clock>(
    clock: C,
    settings: Settings,
    profiles: Vec<Profile>,
    key_pools: Vec<KeyPool>,
    schedules: Vec<Schedule>,
) -> Harness<C> {
    let launcher = Arc::new(FakeLauncher::new());
    let profiles = Arc::new(MemoryStore::with_entries(profiles));
    let key_pools = Arc::new(MemoryStore::with_entries(key_pools));
    let schedules = Arc::new(MemoryStore::with_entries(schedules));

    let orch = Orchestrator::new(
        EngineDeps {
            profiles: profiles.clone(),
            key_pools: key_pools.clone(),
            schedules: schedules.clone(),
            settings: Arc::new(MemorySettingsStore::new(settings)),
            launcher: launcher.clone(),
        },
        clock,
    )
    .unwrap();

    Harness { orch, launcher, profiles, key_pools, schedules }
}

impl<C: Clock> Harness<C> {
    pub(crate) async fn wait_until(&self, max: Duration, condition: impl Fn() -> bool) -> bool {
        let deadline = tokio::time::Instant::now() + max;
        while tokio::time::Instant::now() < deadline {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        condition()
    }

    pub(crate) async fn wait_for_state(&self, name: &str, state: ProfileState) -> bool {
        let orch = self.orch.clone();
        let name = name.to_string();
        self.wait_until(Duration::from_secs(5), move || {
            orch.runtime(&name).map(|rt| rt.state) == Some(state)
        })
        .await
    }
}
