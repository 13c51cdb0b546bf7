// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Key pool specs: round-robin allocation, exclusivity, rotation,
//! release on every failure path.

use crate::specs::prelude::*;
use std::collections::HashSet;
use std::time::Duration;

fn keyed_profiles(names: &[&str]) -> Vec<Profile> {
    names.iter().map(|n| Profile::builder().name(*n).key_pool("P").build()).collect()
}

fn assigned<C: Clock>(spec: &Spec<C>, name: &str) -> Option<String> {
    spec.orch.runtime(name).unwrap().assigned_key
}

/// No credential is ever assigned to two runtime states at once.
fn assert_exclusive<C: Clock>(spec: &Spec<C>, names: &[&str]) {
    let held: Vec<String> = names.iter().filter_map(|n| assigned(spec, n)).collect();
    let unique: HashSet<&String> = held.iter().collect();
    assert_eq!(held.len(), unique.len(), "duplicate key assignment: {held:?}");
}

/// Scenario: three keyed profiles take the three credentials; a stopped
/// profile's credential goes to the next starter; rotation hands the
/// rotating profile a free credential and frees its old one.
#[tokio::test]
async fn round_robin_and_mutual_exclusion() {
    let spec = spec_harness(
        SystemClock,
        fast_settings(),
        keyed_profiles(&["s1", "s2", "s3", "s4"]),
        vec![pool("P", &["k1", "k2", "k3"])],
        vec![],
    );

    for name in ["s1", "s2", "s3"] {
        spec.orch.start(name).unwrap();
        assert!(wait_for_state(&spec.orch, name, ProfileState::Running).await);
    }
    let held: HashSet<String> =
        ["s1", "s2", "s3"].iter().filter_map(|n| assigned(&spec, n)).collect();
    assert_eq!(
        held,
        HashSet::from(["k1".to_string(), "k2".to_string(), "k3".to_string()])
    );
    assert_exclusive(&spec, &["s1", "s2", "s3"]);

    // s2's credential is released on stop and picked up by s4.
    let freed = assigned(&spec, "s2").unwrap();
    spec.orch.stop("s2", true).await.unwrap();
    assert_eq!(assigned(&spec, "s2"), None);

    spec.orch.start("s4").unwrap();
    assert!(wait_for_state(&spec.orch, "s4", ProfileState::Running).await);
    assert_eq!(assigned(&spec, "s4").unwrap(), freed);
    assert_exclusive(&spec, &["s1", "s3", "s4"]);

    // Rotation: s1 releases k1 and draws the next free credential. With
    // s3 and s4 holding the other two, that is k1 again, granted through
    // the advancing cursor.
    let before = assigned(&spec, "s1").unwrap();
    spec.orch.rotate_key("s1").unwrap();
    let after = assigned(&spec, "s1").unwrap();
    assert_exclusive(&spec, &["s1", "s3", "s4"]);
    assert_eq!(after, before, "only one credential was free to grant");

    // With a second credential free, rotation moves off the current one.
    spec.orch.stop("s3", true).await.unwrap();
    spec.orch.rotate_key("s1").unwrap();
    let rotated = assigned(&spec, "s1").unwrap();
    assert_ne!(rotated, after, "rotation should advance to the freed credential");
    assert_exclusive(&spec, &["s1", "s4"]);
}

#[tokio::test]
async fn usage_view_is_derived_from_runtime_states() {
    let spec = spec_harness(
        SystemClock,
        fast_settings(),
        keyed_profiles(&["s1", "s2"]),
        vec![pool("P", &["k1", "k2"])],
        vec![],
    );
    assert_eq!(spec.orch.key_pool_usage()["P"], Vec::<String>::new());

    spec.orch.start("s1").unwrap();
    assert!(wait_for_state(&spec.orch, "s1", ProfileState::Running).await);
    assert_eq!(spec.orch.key_pool_usage()["P"], ["k1"]);

    spec.orch.stop("s1", true).await.unwrap();
    assert_eq!(spec.orch.key_pool_usage()["P"], Vec::<String>::new());
}

/// rotateKey then releaseKey leaves no assignment regardless of pool
/// state.
#[tokio::test]
async fn rotate_then_release_law() {
    let spec = spec_harness(
        SystemClock,
        fast_settings(),
        keyed_profiles(&["s1"]),
        vec![pool("P", &["k1", "k2"])],
        vec![],
    );
    spec.orch.start("s1").unwrap();
    assert!(wait_for_state(&spec.orch, "s1", ProfileState::Running).await);

    spec.orch.rotate_key("s1").unwrap();
    spec.orch.release_key("s1").unwrap();
    assert_eq!(assigned(&spec, "s1"), None);

    // Same law when rotation is refused for want of credentials.
    let spec2 = spec_harness(
        SystemClock,
        fast_settings(),
        keyed_profiles(&["s1"]),
        vec![pool("P", &[])],
        vec![],
    );
    assert!(spec2.orch.rotate_key("s1").is_err());
    spec2.orch.release_key("s1").unwrap();
    assert_eq!(assigned(&spec2, "s1"), None);
}

/// Crashes release the credential before the relaunch re-acquires.
#[tokio::test]
async fn crashes_release_keys() {
    let spec = spec_harness(
        SystemClock,
        fast_settings(),
        keyed_profiles(&["s1"]),
        vec![pool("P", &["k1", "k2"])],
        vec![],
    );
    spec.launcher.queue_behavior(LaunchBehavior::ExitAfter {
        delay: Duration::from_millis(20),
        code: 1,
    });

    spec.orch.start("s1").unwrap();
    assert!(
        wait_until(Duration::from_secs(5), || spec.launcher.launch_count() == 2).await
    );
    assert!(wait_for_state(&spec.orch, "s1", ProfileState::Running).await);

    // The relaunch drew the next credential in round-robin order.
    assert_eq!(assigned(&spec, "s1").unwrap(), "k2");
}

/// Key events: every assignment change is accompanied by a fresh pool
/// snapshot for observers.
#[tokio::test]
async fn assignment_changes_publish_pool_snapshots() {
    let spec = spec_harness(
        SystemClock,
        fast_settings(),
        keyed_profiles(&["s1"]),
        vec![pool("P", &["k1"])],
        vec![],
    );
    let (mut stream, _guard) = spec.orch.subscribe_events();

    spec.orch.start("s1").unwrap();
    assert!(wait_for_state(&spec.orch, "s1", ProfileState::Running).await);
    tokio::time::sleep(Duration::from_millis(20)).await;

    let events = drain(&mut stream);
    let snapshots: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            Event::KeyPoolsSnapshot { in_use, .. } => Some(in_use),
            _ => None,
        })
        .collect();
    // Join snapshot (empty) plus the assignment snapshot.
    assert!(snapshots.len() >= 2);
    assert_eq!(snapshots.last().unwrap()["P"], ["k1"]);
}
