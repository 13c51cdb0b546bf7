// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction for testable time handling

use chrono::Timelike;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::schedule::MINUTES_PER_DAY;

/// A clock that provides the current time.
///
/// `local_minute_of_day` is local civil time; schedule evaluation runs on it.
pub trait Clock: Clone + Send + Sync + 'static {
    fn now(&self) -> Instant;
    fn epoch_ms(&self) -> u64;
    /// Minute of the local civil day, in `0..MINUTES_PER_DAY`.
    fn local_minute_of_day(&self) -> u16;
}

/// Real system clock
#[derive(Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn epoch_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }

    fn local_minute_of_day(&self) -> u16 {
        let now = chrono::Local::now();
        (now.hour() * 60 + now.minute()) as u16
    }
}

/// Fake clock for testing with controllable time
#[derive(Clone)]
pub struct FakeClock {
    current: Arc<Mutex<Instant>>,
    epoch_ms: Arc<Mutex<u64>>,
    minute_of_day: Arc<Mutex<u16>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            current: Arc::new(Mutex::new(Instant::now())),
            epoch_ms: Arc::new(Mutex::new(1_000_000)),
            minute_of_day: Arc::new(Mutex::new(12 * 60)),
        }
    }

    /// Advance the clock by the given duration.
    ///
    /// Moves the instant, the epoch milliseconds, and the local minute
    /// (wrapping at midnight) together.
    pub fn advance(&self, duration: Duration) {
        *self.current.lock() += duration;
        *self.epoch_ms.lock() += duration.as_millis() as u64;
        let mut minute = self.minute_of_day.lock();
        *minute = ((*minute as u64 + duration.as_secs() / 60) % MINUTES_PER_DAY as u64) as u16;
    }

    /// Set the epoch milliseconds value
    pub fn set_epoch_ms(&self, ms: u64) {
        *self.epoch_ms.lock() = ms;
    }

    /// Pin the local civil time to `hour:minute`.
    pub fn set_local_time(&self, hour: u16, minute: u16) {
        *self.minute_of_day.lock() = (hour * 60 + minute) % MINUTES_PER_DAY;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        *self.current.lock()
    }

    fn epoch_ms(&self) -> u64 {
        *self.epoch_ms.lock()
    }

    fn local_minute_of_day(&self) -> u16 {
        *self.minute_of_day.lock()
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
