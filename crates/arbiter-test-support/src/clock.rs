//! Test clocks — deterministic `Clock` implementations for tests.

use std::sync::Mutex;

use arbiter_core::clock::Clock;
use chrono::{DateTime, Duration, TimeZone, Utc};

/// The timestamp used as "now" across the test suites.
///
/// # Panics
///
/// Never; the date is a valid constant.
#[must_use]
pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
}

/// A clock that always returns a fixed point in time.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// A clock that advances by a fixed step on every reading. The first reading
/// returns the start time.
#[derive(Debug)]
pub struct SteppingClock {
    next: Mutex<DateTime<Utc>>,
    step: Duration,
}

impl SteppingClock {
    /// Create a clock starting at `start` that advances by `step`.
    #[must_use]
    pub fn new(start: DateTime<Utc>, step: Duration) -> Self {
        Self {
            next: Mutex::new(start),
            step,
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        let mut next = self.next.lock().unwrap();
        let reading = *next;
        *next = reading + self.step;
        reading
    }
}
