// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared setup for the spec suite.

pub use marshal_adapters::{FakeLauncher, LaunchBehavior};
pub use marshal_core::test_support::{pool, schedule};
pub use marshal_core::{
    Clock, Event, FakeClock, Frame, HostMessage, Profile, ProfileState, SessionToken, Settings,
    SystemClock,
};
pub use marshal_engine::{EngineDeps, EventStream, Orchestrator};
pub use marshal_storage::{MemorySettingsStore, MemoryStore, Store};

use marshal_core::{KeyPool, Schedule};
use std::sync::Arc;
use std::time::Duration;

/// Timings tightened so every scenario settles in well under a second.
/// Heartbeat surveillance stays effectively off; surveillance scenarios
/// use [`surveillance_settings`].
pub fn fast_settings() -> Settings {
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
        subscriber_backlog_limit: 10_000,
    }
}

/// Heartbeat surveillance compressed: a silent process accrues its third
/// missed beat roughly 350 ms after launch.
pub fn surveillance_settings() -> Settings {
    Settings {
        heartbeat_timeout_ms: 150,
        heartbeat_poll_ms: 60,
        ..fast_settings()
    }
}

pub struct Spec<C: Clock> {
    pub orch: Orchestrator<FakeLauncher, C>,
    pub launcher: Arc<FakeLauncher>,
    pub profiles: Arc<dyn Store<Profile>>,
    pub key_pools: Arc<MemoryStore<KeyPool>>,
    pub schedules: Arc<MemoryStore<Schedule>>,
}

pub fn spec_harness<C: Clock>(
    clock: C,
    settings: Settings,
    profiles: Vec<Profile>,
    key_pools: Vec<KeyPool>,
    schedules: Vec<Schedule>,
) -> Spec<C> {
    let profile_store: Arc<dyn Store<Profile>> = Arc::new(MemoryStore::with_entries(profiles));
    spec_harness_with_store(clock, settings, profile_store, key_pools, schedules)
}

/// Variant taking the profile store directly, for specs that assert
/// durability through a file-backed store.
pub fn spec_harness_with_store<C: Clock>(
    clock: C,
    settings: Settings,
    profiles: Arc<dyn Store<Profile>>,
    key_pools: Vec<KeyPool>,
    schedules: Vec<Schedule>,
) -> Spec<C> {
    let launcher = Arc::new(FakeLauncher::new());
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
    .expect("engine construction");
    orch.start_background();

    Spec { orch, launcher, profiles, key_pools, schedules }
}

/// Poll `condition` every few milliseconds until it holds or `max` passes.
pub async fn wait_until(max: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + max;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

pub async fn wait_for_state<C: Clock>(
    orch: &Orchestrator<FakeLauncher, C>,
    name: &str,
    state: ProfileState,
) -> bool {
    let orch = orch.clone();
    let name = name.to_string();
    wait_until(Duration::from_secs(5), move || {
        orch.runtime(&name).map(|rt| rt.state) == Some(state)
    })
    .await
}

/// Drain everything currently buffered on `stream`.
pub fn drain(stream: &mut EventStream) -> Vec<Event> {
    let mut events = Vec::new();
    while let Some(envelope) = stream.try_next() {
        events.push(envelope.event);
    }
    events
}

/// The state values carried by `ProfileStateChanged` events for `name`,
/// in publish order.
pub fn states_for(events: &[Event], name: &str) -> Vec<ProfileState> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::ProfileStateChanged { name: n, runtime, .. } if n == name => {
                Some(runtime.state)
            }
            _ => None,
        })
        .collect()
}

/// Collapse consecutive duplicates, keeping first occurrences.
pub fn dedup_states(states: Vec<ProfileState>) -> Vec<ProfileState> {
    let mut out: Vec<ProfileState> = Vec::new();
    for state in states {
        if out.last() != Some(&state) {
            out.push(state);
        }
    }
    out
}
