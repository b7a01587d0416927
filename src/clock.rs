//! Time sources for animation ticks and auto-updating text.
//!
//! The surface never calls `Instant::now()` directly; it asks its [`Clock`].
//! [`ManualClock`] lets tests step time deterministically, moving both the
//! monotonic and the wall-clock readings together.

use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use parking_lot::Mutex;

pub trait Clock: Send + Sync {
    /// Monotonic time used for animator progress.
    fn now(&self) -> Instant;

    /// Local wall-clock time used for date/time and countdown components.
    fn wall(&self) -> DateTime<Local>;
}

/// The real system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    base_instant: Instant,
    base_wall: DateTime<Local>,
    elapsed: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::starting_at(Local::now())
    }

    /// Starts the wall clock at `wall`; the monotonic base is the current instant.
    pub fn starting_at(wall: DateTime<Local>) -> Self {
        Self { base_instant: Instant::now(), base_wall: wall, elapsed: Mutex::new(Duration::ZERO) }
    }

    pub fn advance(&self, by: Duration) {
        *self.elapsed.lock() += by;
    }

    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base_instant + self.elapsed()
    }

    fn wall(&self) -> DateTime<Local> {
        // chrono::Duration::from_std only fails past ~292 billion years
        let offset = chrono::Duration::from_std(self.elapsed()).unwrap_or(chrono::Duration::zero());
        self.base_wall + offset
    }
}
