// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The supervision loop: launch, monitor, recover, clean up.
//!
//! One task per profile per run. The task begins at the `Stopped ->
//! Starting` edge (taken by the facade before spawning) and ends at any
//! terminal transition into `Stopped` or `Error`. Cancellation is observed
//! at every suspension point; no per-profile lock is held across awaits.

use crate::orchestrator::{Inner, Orchestrator};
use marshal_adapters::{LaunchSpec, Launcher, ProcessHandle};
use marshal_core::{Clock, HostMessage, ProfileState, SessionToken};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

enum RunOutcome {
    /// Terminal for this supervision task.
    Finished,
    /// Crash within budget; back off and relaunch.
    Retry,
}

pub(crate) async fn supervise<L: Launcher, C: Clock>(
    orch: Orchestrator<L, C>,
    name: String,
    cancel: CancellationToken,
) {
    let inner = &orch.inner;
    loop {
        match run_once(inner, &name, &cancel).await {
            RunOutcome::Finished => break,
            RunOutcome::Retry => {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        stop_cleanup(inner, &name).await;
                        break;
                    }
                    _ = tokio::time::sleep(inner.settings.crash_backoff()) => {}
                }
                if !inner.states.try_transition(&name, ProfileState::Starting) {
                    // An out-of-band stop settled the state during backoff.
                    break;
                }
                match inner.update_profile(&name, |p| p.counters.restarts += 1) {
                    Ok(profile) => inner.publish_state(&name, Some(profile)),
                    Err(_) => inner.publish_state(&name, None),
                }
            }
        }
    }
}

async fn run_once<L: Launcher, C: Clock>(
    inner: &Arc<Inner<L, C>>,
    name: &str,
    cancel: &CancellationToken,
) -> RunOutcome {
    // Preflight: re-read the profile; durable data is never cached across
    // decision points.
    let profile = match inner.profiles.get_by_name(name) {
        Ok(Some(profile)) => profile,
        Ok(None) => {
            fail_run(inner, name, "profile missing from store");
            return RunOutcome::Finished;
        }
        Err(e) => {
            fail_run(inner, name, &format!("store error: {e}"));
            return RunOutcome::Finished;
        }
    };

    let mut credential = None;
    if let Some(pool_name) = &profile.key_pool {
        let pool = inner.key_pools.get_by_name(pool_name).ok().flatten();
        match pool.as_ref().and_then(|pool| inner.acquire_key(pool, name)) {
            Some(found) => {
                inner.publish_key_pools();
                credential = Some(found);
            }
            None => {
                // Missing pool and exhausted pool surface the same way.
                fail_run(inner, name, "no available keys");
                return RunOutcome::Finished;
            }
        }
    }

    // Launch.
    let token = SessionToken::new();
    inner.registry.insert(token, name);
    let spec = LaunchSpec {
        profile: name.to_string(),
        executable: profile.executable.clone(),
        arguments: profile.arguments.clone(),
        credential: credential.map(|c| c.payload),
        window: profile.window,
        visible: profile.visible,
        host_token: token,
    };

    let handle = match tokio::time::timeout(inner.settings.launch_ready(), inner.launcher.launch(spec))
        .await
    {
        Ok(Ok(handle)) => handle,
        Ok(Err(e)) => {
            inner.registry.remove(token);
            fail_run(inner, name, &format!("launch failed: {e}"));
            return RunOutcome::Finished;
        }
        Err(_) => {
            inner.registry.remove(token);
            return crash_recovery(inner, name, None).await;
        }
    };

    // Enter Running.
    let now = inner.clock.epoch_ms();
    inner.states.with_slot(name, |slot| {
        slot.handle = Some(Arc::clone(&handle));
        slot.runtime.pid = handle.pid();
        slot.runtime.started_at_ms = Some(now);
        slot.runtime.last_heartbeat_ms = None;
        slot.runtime.missed_heartbeats = 0;
        slot.runtime.status.clear();
    });
    if !inner.states.try_transition(name, ProfileState::Running) {
        // An out-of-band stop arrived between launch and here.
        stop_cleanup(inner, name).await;
        return RunOutcome::Finished;
    }
    inner.publish_state(name, None);

    monitor(inner, name, cancel, handle).await
}

async fn monitor<L: Launcher, C: Clock>(
    inner: &Arc<Inner<L, C>>,
    name: &str,
    cancel: &CancellationToken,
    handle: Arc<dyn ProcessHandle>,
) -> RunOutcome {
    let heartbeat_poll = inner.settings.heartbeat_poll();
    let mut next_heartbeat_check = tokio::time::Instant::now() + heartbeat_poll;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                stop_cleanup(inner, name).await;
                return RunOutcome::Finished;
            }
            _ = tokio::time::sleep(inner.settings.monitor_poll()) => {}
        }

        if handle.has_exited() {
            let code = handle.exit_code().unwrap_or(-1);
            if code == 0 {
                stop_cleanup(inner, name).await;
                return RunOutcome::Finished;
            }
            return crash_recovery(inner, name, Some(code)).await;
        }

        if tokio::time::Instant::now() >= next_heartbeat_check {
            next_heartbeat_check += heartbeat_poll;

            let Some(runtime) = inner.states.snapshot(name) else {
                return RunOutcome::Finished;
            };
            let started = runtime.started_at_ms.unwrap_or(0);
            let base = runtime.last_heartbeat_ms.unwrap_or(started).max(started);
            let elapsed = inner.clock.epoch_ms().saturating_sub(base);
            let overdue = elapsed > inner.settings.heartbeat_timeout_ms;

            if runtime.last_heartbeat_ms.is_none() || overdue {
                nudge(inner, name, &handle).await;
            }

            if overdue {
                let missed = inner
                    .states
                    .update(name, |rt| {
                        rt.missed_heartbeats += 1;
                        rt.missed_heartbeats
                    })
                    .unwrap_or(0);
                inner.publish_state(name, None);

                if missed >= inner.settings.max_missed_heartbeats {
                    tracing::warn!(profile = name, missed, "heartbeat surveillance forcing stop");
                    if inner.states.try_transition(name, ProfileState::Stopping) {
                        inner.publish_state(name, None);
                    }
                    stop_cleanup(inner, name).await;
                    return RunOutcome::Finished;
                }
            }
        }
    }
}

/// Announce the host's reply token so the runtime learns where to send
/// its first heartbeat.
async fn nudge<L: Launcher, C: Clock>(
    inner: &Arc<Inner<L, C>>,
    name: &str,
    handle: &Arc<dyn ProcessHandle>,
) {
    if let Err(e) = inner
        .launcher
        .send_message(handle.as_ref(), HostMessage::Announce, &handle.token().to_string())
        .await
    {
        tracing::debug!(profile = name, error = %e, "nudge failed");
    }
}

/// Non-retryable failure of the current run: set the status, release the
/// key, enter `Error`.
fn fail_run<L: Launcher, C: Clock>(inner: &Arc<Inner<L, C>>, name: &str, status: &str) {
    let had_key = inner
        .states
        .update(name, |rt| {
            rt.status = status.to_string();
            rt.pid = None;
            rt.assigned_key.take().is_some()
        })
        .unwrap_or(false);
    if had_key {
        inner.publish_key_pools();
    }
    let _ = inner.states.try_transition(name, ProfileState::Error);
    inner.publish_state(name, None);
}

/// Crash path: bump the persistent crash counter, release the key, and
/// either schedule a relaunch or declare the run terminally failed.
///
/// `exit_code` is `None` when the launch itself timed out.
async fn crash_recovery<L: Launcher, C: Clock>(
    inner: &Arc<Inner<L, C>>,
    name: &str,
    exit_code: Option<i32>,
) -> RunOutcome {
    let status = match exit_code {
        Some(code) => format!("crashed (exit code {code})"),
        None => "launch timed out".to_string(),
    };
    tracing::warn!(profile = name, exit_code, "process crashed");

    let crashed_profile = inner.update_profile(name, |p| p.counters.crashes += 1).ok();

    let taken = inner.states.with_slot(name, |slot| slot.handle.take()).flatten();
    if let Some(handle) = taken {
        inner.registry.remove(handle.token());
    }

    let (crash_count, had_key) = inner
        .states
        .update(name, |rt| {
            rt.pid = None;
            rt.crash_count += 1;
            rt.status = status.clone();
            let had_key = rt.assigned_key.take().is_some();
            (rt.crash_count, had_key)
        })
        .unwrap_or((0, false));
    if had_key {
        inner.publish_key_pools();
    }

    if crash_count >= inner.settings.max_crash_retries {
        // Disable the schedule durably before the next evaluator tick so
        // the profile is not re-armed into the same failure.
        let disabled = inner
            .update_profile(name, |p| p.schedule_enabled = false)
            .ok()
            .or(crashed_profile);
        inner.states.update(name, |rt| rt.status = "max retries exceeded".to_string());
        let _ = inner.states.try_transition(name, ProfileState::Error);
        inner.publish_state(name, disabled);
        return RunOutcome::Finished;
    }

    let _ = inner.states.try_transition(name, ProfileState::Error);
    inner.publish_state(name, crashed_profile);
    RunOutcome::Retry
}

/// Stop path shared by supervised cleanup, facade stop, and shutdown:
/// unregister the handle, terminate with bounded grace, move to `Stopped`,
/// and release everything transient.
pub(crate) async fn stop_cleanup<L: Launcher, C: Clock>(inner: &Arc<Inner<L, C>>, name: &str) {
    if inner.states.try_transition(name, ProfileState::Stopping) {
        inner.publish_state(name, None);
    }

    let taken = inner.states.with_slot(name, |slot| slot.handle.take()).flatten();
    if let Some(handle) = taken {
        inner.registry.remove(handle.token());
        if let Err(e) = inner
            .launcher
            .terminate(handle.as_ref(), inner.settings.graceful_stop())
            .await
        {
            tracing::warn!(profile = name, error = %e, "terminate failed");
        }
    }

    let had_key = inner
        .states
        .update(name, |rt| {
            rt.status.clear();
            rt.pid = None;
            rt.missed_heartbeats = 0;
            rt.assigned_key.take().is_some()
        })
        .unwrap_or(false);

    let _ = inner.states.try_transition(name, ProfileState::Stopped);
    inner.publish_state(name, None);
    if had_key {
        inner.publish_key_pools();
    }
}
