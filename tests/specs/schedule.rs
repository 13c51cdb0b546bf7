// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schedule activation specs, including the midnight wrap.

use crate::specs::prelude::*;
use std::time::Duration;

fn overnight_spec() -> (Spec<FakeClock>, FakeClock) {
    let clock = FakeClock::new();
    let spec = spec_harness(
        clock.clone(),
        fast_settings(),
        vec![Profile::builder()
            .name("d")
            .schedule("overnight")
            .schedule_enabled(true)
            .build()],
        vec![],
        vec![schedule("overnight", (22, 0), (6, 0))],
    );
    (spec, clock)
}

/// Scenario: at 23:59 a stopped profile inside a 22:00-06:00 window is
/// started; at 06:00 it is stopped again.
#[tokio::test]
async fn activation_across_midnight() {
    let (spec, clock) = overnight_spec();

    clock.set_local_time(23, 59);
    spec.orch.evaluate_schedules_now().await;
    assert!(wait_for_state(&spec.orch, "d", ProfileState::Running).await);

    clock.set_local_time(0, 30);
    spec.orch.evaluate_schedules_now().await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(spec.orch.runtime("d").unwrap().state, ProfileState::Running);

    clock.set_local_time(6, 0);
    spec.orch.evaluate_schedules_now().await;
    assert!(wait_for_state(&spec.orch, "d", ProfileState::Stopped).await);
}

/// The window boundary is inclusive at start, exclusive at end.
#[tokio::test]
async fn boundaries_are_start_inclusive_end_exclusive() {
    let (spec, clock) = overnight_spec();

    clock.set_local_time(22, 0);
    spec.orch.evaluate_schedules_now().await;
    assert!(wait_for_state(&spec.orch, "d", ProfileState::Running).await);

    clock.set_local_time(5, 59);
    spec.orch.evaluate_schedules_now().await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(spec.orch.runtime("d").unwrap().state, ProfileState::Running);

    clock.set_local_time(6, 0);
    spec.orch.evaluate_schedules_now().await;
    assert!(wait_for_state(&spec.orch, "d", ProfileState::Stopped).await);
}

/// Toggling schedule-enabled on and back off restores hands-off
/// evaluator behaviour.
#[tokio::test]
async fn enable_then_disable_is_inert() {
    let (spec, clock) = overnight_spec();
    clock.set_local_time(23, 0);

    spec.orch.set_schedule_enabled("d", false).unwrap();
    spec.orch.evaluate_schedules_now().await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(spec.orch.runtime("d").unwrap().state, ProfileState::Stopped);
    assert_eq!(spec.launcher.launch_count(), 0);
}

/// The periodic tick drives activation without manual evaluation.
#[tokio::test]
async fn background_tick_activates() {
    let clock = FakeClock::new();
    clock.set_local_time(23, 0);
    let settings = Settings { schedule_tick_ms: 20, ..fast_settings() };
    let spec = spec_harness(
        clock.clone(),
        settings,
        vec![Profile::builder()
            .name("d")
            .schedule("overnight")
            .schedule_enabled(true)
            .build()],
        vec![],
        vec![schedule("overnight", (22, 0), (6, 0))],
    );

    assert!(wait_for_state(&spec.orch, "d", ProfileState::Running).await);
    assert!(spec.launcher.launch_count() >= 1);
}
