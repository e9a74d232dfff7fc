//! Real-time clock sources
//!
//! The mixer compares queued timestamps against "now" to detect late data.
//! [`MonotonicClock`] reads the process-wide monotonic clock; [`ManualClock`]
//! is driven explicitly by tests and simulations.

use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;
use tsmix_common::timing::{Mtime, CLOCK_FREQ};

/// Source of the current real time in clock units
pub trait TimeSource: Send + Sync {
    /// Current time; always greater than zero
    fn now(&self) -> Mtime;
}

/// Process-wide origin for [`MonotonicClock`]
static EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Monotonic real-time clock
///
/// Starts one second after the process epoch so that valid timestamps are
/// never confused with the unset value `0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl MonotonicClock {
    pub fn new() -> Self {
        Lazy::force(&EPOCH);
        Self
    }
}

impl TimeSource for MonotonicClock {
    fn now(&self) -> Mtime {
        CLOCK_FREQ + EPOCH.elapsed().as_micros() as Mtime
    }
}

/// Manually advanced clock for tests and simulations
#[derive(Debug)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Create a clock reading `start`
    pub fn new(start: Mtime) -> Self {
        Self {
            now: AtomicI64::new(start),
        }
    }

    /// Jump to `now`
    pub fn set(&self, now: Mtime) {
        self.now.store(now, Ordering::Release);
    }

    /// Move forward by `delta` and return the new time
    pub fn advance(&self, delta: Mtime) -> Mtime {
        self.now.fetch_add(delta, Ordering::AcqRel) + delta
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> Mtime {
        self.now.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_clock_is_nonzero_and_nondecreasing() {
        let clock = MonotonicClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(a >= CLOCK_FREQ);
        assert!(b >= a);
    }

    #[test]
    fn test_manual_clock_set_and_advance() {
        let clock = ManualClock::new(100);
        assert_eq!(clock.now(), 100);
        assert_eq!(clock.advance(50), 150);
        clock.set(10);
        assert_eq!(clock.now(), 10);
    }
}
