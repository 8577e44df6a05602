//! Time source for expirations and audit fields.
//!
//! All timestamps in this crate are unix seconds (`i64`), with `0` meaning
//! "never" wherever an expiry is stored.

use std::sync::atomic::{AtomicI64, Ordering};

/// Seconds in one day, used for authorization lifetimes.
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Source of the current time in unix seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

/// Wall clock backed by `chrono::Utc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Hand-driven clock for tests and replay tooling.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start: i64) -> Self {
        Self {
            now: AtomicI64::new(start),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Move the clock forward by `seconds` (negative values move it back).
    pub fn advance(&self, seconds: i64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// `now` plus the given number of minutes, saturating at the `i64` bounds.
pub fn add_minutes(now: i64, minutes: i64) -> i64 {
    now.saturating_add(minutes.saturating_mul(60))
}

/// `now` plus the given number of days, saturating at the `i64` bounds.
pub fn add_days(now: i64, days: i64) -> i64 {
    now.saturating_add(days.saturating_mul(SECONDS_PER_DAY))
}
