//! Clock abstraction for acquisition timestamps.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// Abstraction over system time so acquisition timestamps are injectable.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system clock.
///
/// Readings never go backwards: if the wall clock steps back, the last
/// reading handed out is returned again until real time catches up.
#[derive(Debug, Default)]
pub struct SystemClock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl SystemClock {
    /// Creates a new system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        let mut last = self.last.lock();
        let reading = match *last {
            Some(previous) => Utc::now().max(previous),
            None => Utc::now(),
        };
        *last = Some(reading);
        reading
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_readings_never_decrease() {
        // Arrange
        let clock = SystemClock::new();

        // Act
        let readings: Vec<DateTime<Utc>> = (0..1_000).map(|_| clock.now()).collect();

        // Assert
        assert!(readings.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn test_system_clock_clamps_to_last_reading() {
        // Arrange: pretend a previous reading came from the future.
        let clock = SystemClock::new();
        let future = Utc::now() + chrono::Duration::hours(1);
        *clock.last.lock() = Some(future);

        // Act
        let reading = clock.now();

        // Assert
        assert_eq!(reading, future);
    }
}
