//! Continuity checker
//!
//! Validates that the input queue holds a gap-free run of blocks covering the
//! output span `[start, end)` and repairs the queue when it does not:
//!
//! ```text
//! seed:    head.pts < now - late_tolerance            → trash head (too late to play)
//! past:    head.pts + head.length < start - tolerance  → trash head (already behind output)
//! walk:    |next.pts - coverage_end| > tolerance       → discontinuity: trash every block
//!                                                        before `next`, restart from it
//! done:    coverage_end >= end                         → sufficient
//!          queue exhausted first                       → insufficient (no partial output)
//! ```
//!
//! Every repair is lossy: discarded audio is never replayed. Discarding the
//! head block always invalidates the mix cursor.

use crate::input::InputQueue;
use tracing::{trace, warn};
use tsmix_common::timing::Mtime;

/// Outcome of a coverage check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coverage {
    /// The queue covers `[start, end)` without gaps
    Sufficient,

    /// Not enough contiguous data yet
    Insufficient,
}

/// Blocks discarded while validating one cycle
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Repairs {
    /// Blocks trashed while seeding because they started before `now`
    pub late: usize,

    /// Blocks ending before the output start
    pub past: usize,

    /// Blocks preceding a timestamp discontinuity
    pub gap: usize,
}

impl Repairs {
    pub fn total(&self) -> usize {
        self.late + self.past + self.gap
    }
}

/// Timestamp continuity validator for one input queue
#[derive(Debug, Clone, Copy)]
pub struct ContinuityChecker {
    /// Maximum |difference| between adjacent timestamps still treated as contiguous
    tolerance: Mtime,
}

impl ContinuityChecker {
    /// Create a checker accepting `tolerance` units of timestamp rounding error
    pub fn new(tolerance: Mtime) -> Self {
        Self {
            tolerance: tolerance.max(0),
        }
    }

    pub fn tolerance(&self) -> Mtime {
        self.tolerance
    }

    /// Find a start timestamp for an unset output clock
    ///
    /// Trashes head blocks that start more than `late_tolerance` before `now`
    /// and returns the timestamp of the first remaining block, or `None` if
    /// the queue runs dry.
    pub fn seed(
        &self,
        queue: &mut InputQueue,
        now: Mtime,
        late_tolerance: Mtime,
        repairs: &mut Repairs,
    ) -> Option<Mtime> {
        loop {
            let pts = queue.front()?.pts;
            if pts >= now - late_tolerance {
                trace!("Seeding output clock from input block at {}", pts);
                return Some(pts);
            }

            warn!("Input PTS is out of range ({}), trashing", now - pts);
            queue.pop_front();
            repairs.late += 1;
        }
    }

    /// Check that `[start, end)` is covered, repairing the queue on the way
    pub fn check(
        &self,
        queue: &mut InputQueue,
        start: Mtime,
        end: Mtime,
        repairs: &mut Repairs,
    ) -> Coverage {
        // The first retained block must reach the start of the output span
        let mut coverage_end = loop {
            let Some(head) = queue.front() else {
                return Coverage::Insufficient;
            };
            let head_end = head.end();
            if head_end >= start - self.tolerance {
                break head_end;
            }

            warn!("Mixer got a packet in the past ({})", start - head_end);
            queue.pop_front();
            repairs.past += 1;
        };

        // Walk forward until the span is covered
        let mut index = 0;
        while coverage_end < end {
            index += 1;
            let Some(next) = queue.get(index) else {
                return Coverage::Insufficient;
            };
            let (next_pts, next_end) = (next.pts, next.end());

            if (next_pts - coverage_end).abs() > self.tolerance {
                warn!(
                    "Buffer hole, dropping packets ({})",
                    next_pts - coverage_end
                );
                repairs.gap += queue.discard_front(index);
                index = 0;
            }

            coverage_end = next_end;
        }

        Coverage::Sufficient
    }
}
