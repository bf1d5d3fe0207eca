//! Injected time and single-slot deferred tasks.
//!
//! Every deferred action (refresh after mutations, refresh after a
//! selection, initial detection, stats flush) is one [`ScheduledTask`]: a
//! single optional deadline. Scheduling again replaces the deadline, so a
//! burst of triggers coalesces into one firing after the last of them. Tasks
//! only fire when their owner polls them, never from inside the code that
//! armed them.

#![allow(missing_docs)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;

/// Monotonic plus wall-clock time source.
pub trait Clock {
    /// Monotonic time since an arbitrary origin.
    fn now(&self) -> Duration;

    fn wall_time(&self) -> DateTime<Utc>;
}

/// Real time.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn wall_time(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-advanced clock for tests and the CLI simulator. Clones share time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    inner: Arc<Mutex<ManualState>>,
}

#[derive(Debug)]
struct ManualState {
    elapsed: Duration,
    epoch: DateTime<Utc>,
}

impl ManualClock {
    /// Start at `epoch` with zero elapsed time.
    #[must_use]
    pub fn starting_at(epoch: DateTime<Utc>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ManualState {
                elapsed: Duration::ZERO,
                epoch,
            })),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.inner.lock().elapsed += by;
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::starting_at(DateTime::<Utc>::UNIX_EPOCH)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.inner.lock().elapsed
    }

    fn wall_time(&self) -> DateTime<Utc> {
        let state = self.inner.lock();
        let delta = TimeDelta::from_std(state.elapsed).unwrap_or(TimeDelta::MAX);
        state.epoch.checked_add_signed(delta).unwrap_or(state.epoch)
    }
}

/// One cancelable deadline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduledTask {
    deadline: Option<Duration>,
}

impl ScheduledTask {
    #[must_use]
    pub const fn idle() -> Self {
        Self { deadline: None }
    }

    /// Arm (or re-arm) to fire `delay` after `now`. Replaces any pending deadline.
    pub fn schedule(&mut self, now: Duration, delay: Duration) {
        self.deadline = Some(now.saturating_add(delay));
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    #[must_use]
    pub const fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Disarm and return true when the deadline has passed.
    pub fn fire_if_due(&mut self, now: Duration) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}
