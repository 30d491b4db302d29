//! Clock abstraction
//!
//! Lease expiry and retry backoff both compare stored timestamps against
//! "now". Stores take the current time from a [`Clock`] instead of calling
//! `Utc::now()` directly so that tests can move time forward deterministically.

use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::sync::{Arc, Mutex};

/// Source of the current time
pub trait Clock: Send + Sync + fmt::Debug {
    /// Returns the current instant in UTC
    fn now(&self) -> DateTime<Utc>;
}

/// Shared, dynamically dispatched clock handle
pub type SharedClock = Arc<dyn Clock>;

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Returns a shared handle to the system clock
    pub fn shared() -> SharedClock {
        Arc::new(SystemClock)
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests
///
/// Cloning a `ManualClock` yields a handle to the same instant, so a test can
/// keep one handle and give another to the store under test.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Creates a clock frozen at the current wall-clock time
    pub fn starting_now() -> Self {
        Self::new(Utc::now())
    }

    /// Moves the clock forward by `by`
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += by;
    }

    /// Sets the clock to an absolute instant
    pub fn set(&self, to: DateTime<Utc>) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_manual_clock_advances_shared_handles() {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        let handle: SharedClock = Arc::new(clock.clone());

        clock.advance(Duration::seconds(90));

        assert_eq!(handle.now(), start + Duration::seconds(90));
    }

    #[test]
    fn test_system_clock_is_monotonic_enough() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
