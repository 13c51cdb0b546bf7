// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schedule evaluator: once per tick, start and stop profiles by their
//! activation windows.
//!
//! Only two combinations trigger action: in-window + `Stopped` starts, and
//! out-of-window + `Running` stops. `Starting`, `Stopping`, and `Error`
//! are left to settle.

use crate::orchestrator::Orchestrator;
use marshal_adapters::Launcher;
use marshal_core::{Clock, ProfileState, Schedule};
use std::collections::HashMap;

pub(crate) async fn run_evaluator<L: Launcher, C: Clock>(orch: Orchestrator<L, C>) {
    let tick = orch.inner.settings.schedule_tick();
    loop {
        tokio::select! {
            _ = orch.inner.shutdown.cancelled() => break,
            _ = tokio::time::sleep(tick) => {}
        }
        evaluate_once(&orch).await;
    }
}

pub(crate) async fn evaluate_once<L: Launcher, C: Clock>(orch: &Orchestrator<L, C>) {
    let inner = &orch.inner;
    let Ok(profiles) = inner.profiles.list() else {
        return;
    };
    let schedules: HashMap<String, Schedule> = match inner.schedules.list() {
        Ok(schedules) => schedules.into_iter().map(|s| (s.name.clone(), s)).collect(),
        Err(_) => return,
    };

    let minute = inner.clock.local_minute_of_day();

    for profile in profiles {
        if !profile.schedule_enabled {
            continue;
        }
        let Some(schedule) = profile.schedule.as_ref().and_then(|s| schedules.get(s)) else {
            continue;
        };
        let Some(state) = inner.states.snapshot(&profile.name).map(|rt| rt.state) else {
            continue;
        };

        match (schedule.contains(minute), state) {
            (true, ProfileState::Stopped) => {
                tracing::info!(profile = %profile.name, schedule = %schedule.name, "schedule window opened");
                if let Err(e) = orch.start(&profile.name) {
                    tracing::warn!(profile = %profile.name, error = %e, "scheduled start refused");
                }
            }
            (false, ProfileState::Running) => {
                tracing::info!(profile = %profile.name, schedule = %schedule.name, "schedule window closed");
                if let Err(e) = orch.stop(&profile.name, false).await {
                    tracing::warn!(profile = %profile.name, error = %e, "scheduled stop refused");
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
#[path = "evaluator_tests.rs"]
mod tests;
