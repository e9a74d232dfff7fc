//! Output clock
//!
//! Tracks the timestamp at which the next mixed buffer must start. The clock
//! advances by whole output periods using [`AudioDate`], so the running
//! position never drifts from the true sample count. `0` means unset: the
//! mixer must reseed the clock from the input queue before mixing.

use tsmix_common::timing::{AudioDate, Mtime};

/// Next expected output timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputClock {
    date: AudioDate,
}

impl OutputClock {
    /// Create an unset clock for output at `rate` Hz
    pub fn new(rate: u32) -> Self {
        Self {
            date: AudioDate::new(rate),
        }
    }

    /// Start timestamp of the next output buffer (0 = unset)
    pub fn next_start(&self) -> Mtime {
        self.date.get()
    }

    pub fn is_set(&self) -> bool {
        self.date.is_set()
    }

    /// Whether the clock is set but lies more than `tolerance` behind `now`
    pub fn is_late(&self, now: Mtime, tolerance: Mtime) -> bool {
        self.is_set() && self.next_start() < now - tolerance
    }

    /// Advance by `samples` and return the new end timestamp
    pub fn advance(&mut self, samples: u32) -> Mtime {
        self.date.increment(samples)
    }

    /// Set the clock to `timestamp` (0 unsets it)
    pub fn reset(&mut self, timestamp: Mtime) {
        self.date.set(timestamp);
    }

    /// Copy of the underlying date, including its carried remainder
    pub fn date(&self) -> AudioDate {
        self.date
    }
}
