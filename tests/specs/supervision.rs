// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervision specs: launch, heartbeat surveillance, crash recovery,
//! crash exhaustion.

use crate::specs::prelude::*;
use marshal_storage::JsonStore;
use std::sync::Arc;
use std::time::Duration;

/// A silent process is nudged, accrues three missed beats, and is forced
/// back to Stopped.
#[tokio::test]
async fn silent_process_is_stopped_by_heartbeat_surveillance() {
    let spec = spec_harness(
        SystemClock,
        surveillance_settings(),
        vec![Profile::builder().name("a").build()],
        vec![],
        vec![],
    );
    let (mut stream, _guard) = spec.orch.subscribe_events();

    spec.orch.start("a").unwrap();
    assert!(wait_for_state(&spec.orch, "a", ProfileState::Running).await);
    assert!(wait_for_state(&spec.orch, "a", ProfileState::Stopped).await);

    tokio::time::sleep(Duration::from_millis(20)).await;
    let events = drain(&mut stream);
    let states = dedup_states(states_for(&events, "a"));
    assert_eq!(
        states,
        [
            ProfileState::Starting,
            ProfileState::Running,
            ProfileState::Stopping,
            ProfileState::Stopped,
        ]
    );

    // The missed-beat climb was visible to observers.
    let max_missed = events
        .iter()
        .filter_map(|e| match e {
            Event::ProfileStateChanged { name, runtime, .. } if name == "a" => {
                Some(runtime.missed_heartbeats)
            }
            _ => None,
        })
        .max()
        .unwrap();
    assert_eq!(max_missed, 3);

    // Every nudge was an announce carrying the host token.
    let announces = spec.launcher.sent_messages();
    assert!(announces.len() >= 3, "expected repeated nudges, saw {}", announces.len());
    let token = spec.launcher.last_token().unwrap();
    assert!(announces
        .iter()
        .all(|m| m.message == HostMessage::Announce && m.payload == token.to_string()));
}

/// A process that heartbeats stays Running well past the surveillance
/// deadline.
#[tokio::test]
async fn heartbeats_keep_the_process_alive() {
    let spec = spec_harness(
        SystemClock,
        surveillance_settings(),
        vec![Profile::builder().name("a").build()],
        vec![],
        vec![],
    );
    spec.orch.start("a").unwrap();
    assert!(wait_for_state(&spec.orch, "a", ProfileState::Running).await);
    let token = spec.launcher.last_token().unwrap();

    let frames = spec.orch.frame_sender();
    for _ in 0..10 {
        frames.send(Frame::new(token, "heartBeat", vec![])).unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
    }
    assert_eq!(spec.orch.runtime("a").unwrap().state, ProfileState::Running);
    assert_eq!(spec.orch.runtime("a").unwrap().missed_heartbeats, 0);
}

/// Scenario: the first three launches die with exit code 1, the fourth
/// stays up. Crash recovery relaunches within budget and the persistent
/// crash counter records each death.
#[tokio::test]
async fn crash_recovery_within_budget() {
    let spec = spec_harness(
        SystemClock,
        fast_settings(),
        vec![Profile::builder().name("b").build()],
        vec![],
        vec![],
    );
    spec.launcher.queue_behaviors(
        LaunchBehavior::ExitAfter { delay: Duration::from_millis(20), code: 1 },
        3,
    );
    let (mut stream, _guard) = spec.orch.subscribe_events();

    spec.orch.start("b").unwrap();
    assert!(
        wait_until(Duration::from_secs(5), || spec.launcher.launch_count() == 4).await,
        "expected four launches, saw {}",
        spec.launcher.launch_count()
    );
    assert!(wait_for_state(&spec.orch, "b", ProfileState::Running).await);

    // The fourth run proves itself healthy with a heartbeat.
    let token = spec.launcher.last_token().unwrap();
    spec.orch.frame_sender().send(Frame::new(token, "heartBeat", vec![])).unwrap();
    assert!(
        wait_until(Duration::from_secs(1), || {
            spec.orch.runtime("b").unwrap().crash_count == 0
        })
        .await
    );

    let profile = spec.profiles.get_by_name("b").unwrap().unwrap();
    assert_eq!(profile.counters.crashes, 3);
    assert_eq!(profile.counters.restarts, 3);

    // Four Starting/Running pairs are visible in the stream.
    let events = drain(&mut stream);
    let states = states_for(&events, "b");
    let startings = states.iter().filter(|s| **s == ProfileState::Starting).count();
    let runnings = states.iter().filter(|s| **s == ProfileState::Running).count();
    assert_eq!(startings, 4);
    assert_eq!(runnings, 4);
    assert_eq!(spec.orch.runtime("b").unwrap().state, ProfileState::Running);
}

/// Scenario: every launch crashes. After the retry budget is spent the
/// profile lands in Error with its schedule durably disabled, and the
/// next evaluator pass does not re-arm it.
#[tokio::test]
async fn crash_exhaustion_disables_the_schedule() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn Store<Profile>> =
        Arc::new(JsonStore::open(dir.path().join("profiles.json")).unwrap());
    store
        .create(
            Profile::builder()
                .name("c")
                .schedule("always")
                .schedule_enabled(true)
                .build(),
        )
        .unwrap();

    let clock = FakeClock::new();
    clock.set_local_time(12, 0);
    let spec = spec_harness_with_store(
        clock,
        fast_settings(),
        store,
        vec![],
        vec![schedule("always", (0, 0), (23, 59))],
    );
    spec.launcher.queue_behaviors(
        LaunchBehavior::ExitAfter { delay: Duration::from_millis(5), code: 1 },
        5,
    );

    spec.orch.start("c").unwrap();
    assert!(wait_for_state(&spec.orch, "c", ProfileState::Error).await);

    let runtime = spec.orch.runtime("c").unwrap();
    assert!(runtime.status.contains("max"), "status was {:?}", runtime.status);
    assert_eq!(spec.launcher.launch_count(), 5);

    let stored = spec.profiles.get_by_name("c").unwrap().unwrap();
    assert!(!stored.schedule_enabled, "schedule must be durably disabled");
    assert_eq!(stored.counters.crashes, 5);

    // A fresh store handle sees the disabled flag on disk too.
    let reopened: JsonStore<Profile> = JsonStore::open(dir.path().join("profiles.json")).unwrap();
    assert!(!reopened.get_by_name("c").unwrap().unwrap().schedule_enabled);

    // The evaluator leaves the profile alone on its next pass.
    spec.orch.evaluate_schedules_now().await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(spec.launcher.launch_count(), 5);
    assert_eq!(spec.orch.runtime("c").unwrap().state, ProfileState::Error);
}

/// A launch the collaborator itself rejects is terminal, not retried.
#[tokio::test]
async fn spawn_failure_is_terminal() {
    let spec = spec_harness(
        SystemClock,
        fast_settings(),
        vec![Profile::builder().name("d").build()],
        vec![],
        vec![],
    );
    spec.launcher.queue_behavior(LaunchBehavior::FailSpawn);

    spec.orch.start("d").unwrap();
    assert!(wait_for_state(&spec.orch, "d", ProfileState::Error).await);
    assert!(spec.orch.runtime("d").unwrap().status.contains("launch failed"));
    assert_eq!(spec.launcher.launch_count(), 1);

    // Error is restartable once the operator intervenes.
    spec.orch.start("d").unwrap();
    assert!(wait_for_state(&spec.orch, "d", ProfileState::Running).await);
}

/// A clean exit (code 0) settles to Stopped without touching the crash
/// counters.
#[tokio::test]
async fn clean_exit_is_not_a_crash() {
    let spec = spec_harness(
        SystemClock,
        fast_settings(),
        vec![Profile::builder().name("e").build()],
        vec![],
        vec![],
    );
    spec.launcher.queue_behavior(LaunchBehavior::ExitAfter {
        delay: Duration::from_millis(20),
        code: 0,
    });

    spec.orch.start("e").unwrap();
    assert!(wait_for_state(&spec.orch, "e", ProfileState::Stopped).await);
    assert_eq!(spec.profiles.get_by_name("e").unwrap().unwrap().counters.crashes, 0);
    assert_eq!(spec.launcher.launch_count(), 1);
}
