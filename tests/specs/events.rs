// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subscriber specs: join ordering, per-profile event order, log fan-out.

use crate::specs::prelude::*;
use std::time::Duration;

/// Scenario: a subscriber joining while s1 runs and s2 is stopped sees
/// the four snapshots, in order, before any incremental event.
#[tokio::test]
async fn join_delivers_snapshots_before_increments() {
    let spec = spec_harness(
        SystemClock,
        fast_settings(),
        vec![
            Profile::builder().name("s1").build(),
            Profile::builder().name("s2").build(),
        ],
        vec![pool("P", &["k1"])],
        vec![schedule("overnight", (22, 0), (6, 0))],
    );
    spec.orch.start("s1").unwrap();
    assert!(wait_for_state(&spec.orch, "s1", ProfileState::Running).await);

    let (mut stream, _guard) = spec.orch.subscribe_events();
    // Publish something immediately after joining.
    spec.orch.stop("s1", true).await.unwrap();

    let first = stream.next().await.unwrap().event;
    match &first {
        Event::ProfilesSnapshot { profiles } => {
            assert_eq!(profiles.len(), 2);
            let s1 = profiles.iter().find(|p| p.profile.name == "s1").unwrap();
            let s2 = profiles.iter().find(|p| p.profile.name == "s2").unwrap();
            assert_eq!(s1.runtime.state, ProfileState::Running);
            assert_eq!(s2.runtime.state, ProfileState::Stopped);
        }
        other => panic!("first event was {other:?}"),
    }
    assert!(matches!(stream.next().await.unwrap().event, Event::KeyPoolsSnapshot { .. }));
    assert!(matches!(stream.next().await.unwrap().event, Event::SchedulesSnapshot { .. }));
    assert!(matches!(stream.next().await.unwrap().event, Event::SettingsSnapshot { .. }));

    // Only now the incremental stop events.
    let next = stream.next().await.unwrap().event;
    assert!(
        matches!(&next, Event::ProfileStateChanged { name, .. } if name == "s1"),
        "expected s1 state change, got {next:?}"
    );
}

/// Per-profile order is preserved for every subscriber, including one
/// that joins mid-stream.
#[tokio::test]
async fn per_profile_order_is_linear_for_all_subscribers() {
    let spec = spec_harness(
        SystemClock,
        fast_settings(),
        vec![Profile::builder().name("a").build()],
        vec![],
        vec![],
    );
    let (mut early, _g1) = spec.orch.subscribe_events();

    spec.orch.start("a").unwrap();
    assert!(wait_for_state(&spec.orch, "a", ProfileState::Running).await);
    let (mut late, _g2) = spec.orch.subscribe_events();

    spec.orch.stop("a", true).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let early_states = dedup_states(states_for(&drain(&mut early), "a"));
    assert_eq!(
        early_states,
        [
            ProfileState::Starting,
            ProfileState::Running,
            ProfileState::Stopping,
            ProfileState::Stopped,
        ]
    );

    // The late subscriber's snapshot already shows Running; it only sees
    // the stop transition incrementally.
    let late_events = drain(&mut late);
    assert!(matches!(late_events[0], Event::ProfilesSnapshot { .. }));
    let late_states = dedup_states(states_for(&late_events, "a"));
    assert_eq!(late_states, [ProfileState::Stopping, ProfileState::Stopped]);
}

/// Console frames fan out as log lines and land in the log ring.
#[tokio::test]
async fn console_lines_reach_subscribers_and_the_ring() {
    let spec = spec_harness(
        SystemClock,
        fast_settings(),
        vec![Profile::builder().name("a").build()],
        vec![],
        vec![],
    );
    spec.orch.start("a").unwrap();
    assert!(wait_for_state(&spec.orch, "a", ProfileState::Running).await);
    let token = spec.launcher.last_token().unwrap();
    let (mut stream, _guard) = spec.orch.subscribe_events();

    spec.orch
        .frame_sender()
        .send(Frame::new(
            token,
            "printToConsole",
            vec![r#"{"msg": "entered act 3", "color": 2}"#.to_string()],
        ))
        .unwrap();

    assert!(
        wait_until(Duration::from_secs(1), || !spec.orch.recent_logs(10).is_empty()).await
    );
    let logs = spec.orch.recent_logs(10);
    assert!(matches!(
        &logs[0].event,
        Event::LogLine { source, content, color: Some(2), .. }
            if source == "a" && content == "entered act 3"
    ));

    let mut saw_log = false;
    while let Some(envelope) = stream.try_next() {
        if matches!(envelope.event, Event::LogLine { .. }) {
            saw_log = true;
        }
    }
    assert!(saw_log, "subscriber should observe the log line");
}

/// Closing one subscriber never disturbs another.
#[tokio::test]
async fn closing_one_subscriber_leaves_others_live() {
    let spec = spec_harness(
        SystemClock,
        fast_settings(),
        vec![Profile::builder().name("a").build()],
        vec![],
        vec![],
    );
    let (_s1, g1) = spec.orch.subscribe_events();
    let (mut s2, _g2) = spec.orch.subscribe_events();
    g1.close();

    spec.orch.start("a").unwrap();
    assert!(wait_for_state(&spec.orch, "a", ProfileState::Running).await);
    tokio::time::sleep(Duration::from_millis(20)).await;

    let states = states_for(&drain(&mut s2), "a");
    assert!(states.contains(&ProfileState::Running));
}
