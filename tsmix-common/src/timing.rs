//! Clock units and sample-accurate date arithmetic
//!
//! All timestamps in tsmix are [`Mtime`] values: signed 64-bit counts of
//! microseconds on a monotonic clock ([`CLOCK_FREQ`] = 1,000,000 Hz). A value
//! of `0` is reserved to mean "unset" wherever a timestamp may be absent.
//!
//! # Sample Counts vs. Clock Units
//!
//! Audio advances in whole samples, but most sample rates do not divide the
//! clock frequency evenly (44,100 Hz → 22.675... µs per sample). Converting
//! each period independently and summing the results would drift by up to one
//! microsecond per period. [`AudioDate`] avoids this by carrying the division
//! remainder between increments:
//!
//! ```text
//! dividend  = samples × CLOCK_FREQ
//! date     += dividend ÷ rate
//! remainder += dividend mod rate   (carry 1 µs into date when remainder ≥ rate)
//! ```
//!
//! After any sequence of increments totalling `n` samples, the date equals
//! `start + floor(n × CLOCK_FREQ ÷ rate)` exactly.
//!
//! # Examples
//!
//! ```rust
//! use tsmix_common::timing::*;
//!
//! assert_eq!(samples_to_mtime(44_100, 44_100), CLOCK_FREQ);
//! assert_eq!(mtime_to_samples(500_000, 48_000), 24_000);
//!
//! let mut date = AudioDate::new(44_100);
//! date.set(1_000_000);
//! for _ in 0..44_100 {
//!     date.increment(1);
//! }
//! assert_eq!(date.get(), 2_000_000);
//! ```

/// Timestamp or duration in microseconds on the monotonic clock
pub type Mtime = i64;

/// Clock frequency: microsecond resolution
pub const CLOCK_FREQ: Mtime = 1_000_000;

/// Convert milliseconds to clock units
pub fn ms_to_mtime(milliseconds: i64) -> Mtime {
    milliseconds * (CLOCK_FREQ / 1000)
}

/// Convert clock units to milliseconds (truncating)
pub fn mtime_to_ms(mtime: Mtime) -> i64 {
    mtime / (CLOCK_FREQ / 1000)
}

/// Convert a sample count to clock units (truncating)
///
/// # Panics
///
/// Panics if `sample_rate` is 0
pub fn samples_to_mtime(samples: u64, sample_rate: u32) -> Mtime {
    assert!(sample_rate > 0, "sample_rate must be > 0");
    (samples as i128 * CLOCK_FREQ as i128 / sample_rate as i128) as Mtime
}

/// Convert clock units to a sample count (truncating toward zero)
///
/// # Panics
///
/// Panics if `sample_rate` is 0
pub fn mtime_to_samples(mtime: Mtime, sample_rate: u32) -> i64 {
    assert!(sample_rate > 0, "sample_rate must be > 0");
    (mtime as i128 * sample_rate as i128 / CLOCK_FREQ as i128) as i64
}

/// Exact date accumulator advanced in whole samples
///
/// Tracks a timestamp plus the sub-microsecond remainder left over by
/// previous increments, so a date advanced by many small sample counts lands
/// on exactly the same value as one advanced by their sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioDate {
    /// Current date in clock units (0 = unset)
    date: Mtime,

    /// Sample rate the date advances at
    rate: u32,

    /// Carried remainder of `samples × CLOCK_FREQ ÷ rate`, always `< rate`
    remainder: u32,
}

impl AudioDate {
    /// Create an unset date advancing at `rate` samples per second
    ///
    /// # Panics
    ///
    /// Panics if `rate` is 0
    pub fn new(rate: u32) -> Self {
        assert!(rate > 0, "rate must be > 0");
        Self {
            date: 0,
            rate,
            remainder: 0,
        }
    }

    /// Set the date, discarding any carried remainder
    pub fn set(&mut self, date: Mtime) {
        self.date = date;
        self.remainder = 0;
    }

    /// Current date
    pub fn get(&self) -> Mtime {
        self.date
    }

    /// Whether the date holds a timestamp (non-zero)
    pub fn is_set(&self) -> bool {
        self.date != 0
    }

    /// Sample rate this date advances at
    pub fn rate(&self) -> u32 {
        self.rate
    }

    /// Advance by `samples` and return the new date
    pub fn increment(&mut self, samples: u32) -> Mtime {
        let dividend = samples as u64 * CLOCK_FREQ as u64;
        let rate = self.rate as u64;

        self.date += (dividend / rate) as Mtime;

        let remainder = self.remainder as u64 + dividend % rate;
        if remainder >= rate {
            self.date += 1;
            self.remainder = (remainder - rate) as u32;
        } else {
            self.remainder = remainder as u32;
        }

        self.date
    }
}
