// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine tunables, persisted as a single document.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Orchestration tunables. Every field is serde-defaulted so a partial or
/// missing document yields the shipped values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// A run with no heartbeat for this long accrues a missed beat.
    pub heartbeat_timeout_ms: u64,
    /// Cadence of heartbeat surveillance inside the monitor loop.
    pub heartbeat_poll_ms: u64,
    /// Missed beats that force a stop.
    pub max_missed_heartbeats: u32,
    /// Cadence of the process-exit poll.
    pub monitor_poll_ms: u64,
    /// Consecutive crashes before a run is declared terminally failed.
    pub max_crash_retries: u32,
    /// Delay between a crash and the relaunch attempt.
    pub crash_backoff_ms: u64,
    /// Grace given to a process between terminate request and force kill.
    pub graceful_stop_ms: u64,
    /// Bound on the launch collaborator's launch call.
    pub launch_ready_ms: u64,
    /// Cadence of the schedule evaluator.
    pub schedule_tick_ms: u64,
    /// Retained log lines; FIFO-trimmed on overflow.
    pub log_ring_capacity: usize,
    /// Queued events after which a slow subscriber is evicted.
    pub subscriber_backlog_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            heartbeat_timeout_ms: 30_000,
            heartbeat_poll_ms: 10_000,
            max_missed_heartbeats: 3,
            monitor_poll_ms: 1_000,
            max_crash_retries: 5,
            crash_backoff_ms: 5_000,
            graceful_stop_ms: 5_000,
            launch_ready_ms: 30_000,
            schedule_tick_ms: 60_000,
            log_ring_capacity: 100_000,
            subscriber_backlog_limit: 100_000,
        }
    }
}

impl Settings {
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }

    pub fn heartbeat_poll(&self) -> Duration {
        Duration::from_millis(self.heartbeat_poll_ms)
    }

    pub fn monitor_poll(&self) -> Duration {
        Duration::from_millis(self.monitor_poll_ms)
    }

    pub fn crash_backoff(&self) -> Duration {
        Duration::from_millis(self.crash_backoff_ms)
    }

    pub fn graceful_stop(&self) -> Duration {
        Duration::from_millis(self.graceful_stop_ms)
    }

    pub fn launch_ready(&self) -> Duration {
        Duration::from_millis(self.launch_ready_ms)
    }

    pub fn schedule_tick(&self) -> Duration {
        Duration::from_millis(self.schedule_tick_ms)
    }
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
