// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction so timeouts and record timestamps can be driven by tests

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Source of both monotonic and wall-clock time.
pub trait Clock: Clone + Send + Sync {
    /// Monotonic instant, used for in-process timeouts.
    fn now(&self) -> Instant;

    /// Wall-clock milliseconds since the Unix epoch, used for record timestamps.
    fn epoch_ms(&self) -> u64;

    /// How long ago `epoch_ms` was. Timestamps in the future count as zero.
    fn age_of(&self, epoch_ms: u64) -> Duration {
        Duration::from_millis(self.epoch_ms().saturating_sub(epoch_ms))
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn epoch_ms(&self) -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
    }
}

struct FakeTime {
    instant: Instant,
    epoch_ms: u64,
}

/// Manually advanced clock. Clones share the same time.
#[derive(Clone)]
pub struct FakeClock {
    time: Arc<Mutex<FakeTime>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            time: Arc::new(Mutex::new(FakeTime { instant: Instant::now(), epoch_ms: 1_000_000_000 })),
        }
    }

    /// Move both the monotonic and the wall clock forward.
    pub fn advance(&self, duration: Duration) {
        let mut time = self.time.lock();
        time.instant += duration;
        time.epoch_ms += duration.as_millis() as u64;
    }

    pub fn set_epoch_ms(&self, ms: u64) {
        self.time.lock().epoch_ms = ms;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.time.lock().instant
    }

    fn epoch_ms(&self) -> u64 {
        self.time.lock().epoch_ms
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
