//! Byte-offset reconciler (linear formats only)
//!
//! The mix cursor records where the previous cycle stopped reading inside the
//! head block. Before mixing, it must agree with where the output start
//! timestamp falls inside that block:
//!
//! ```text
//! expected = (start - head.pts) × bytes_per_frame × rate ÷ frame_length ÷ CLOCK_FREQ
//! ```
//!
//! A recorded cursor within one frame of `expected` is kept. Otherwise the
//! cursor is stale (e.g. the head block changed after a discard) and is moved
//! to `expected` rounded down to a whole frame. A negative result means the
//! output start precedes all retained input: the caller must reset the output
//! clock.

use crate::audio::AudioFormat;
use crate::input::InputQueue;
use tracing::warn;
use tsmix_common::timing::{Mtime, CLOCK_FREQ};

/// Result of aligning the mix cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    /// Recorded cursor already matched the output start
    Kept { offset: usize },

    /// Cursor was stale and has been moved
    Realigned { offset: usize },

    /// Output start lies before the head block; nothing can be mixed
    Negative { offset: i64 },
}

/// Byte offset of `start` inside a block beginning at `head_pts`
///
/// Integer arithmetic, truncating toward zero, evaluated in the order written
/// in the module docs.
pub fn expected_offset(format: &AudioFormat, head_pts: Mtime, start: Mtime) -> i64 {
    let offset = (start - head_pts) as i128
        * format.bytes_per_frame as i128
        * format.rate as i128
        / format.frame_length as i128
        / CLOCK_FREQ as i128;
    offset as i64
}

/// Align the queue's mix cursor with the output start timestamp
///
/// An unset cursor is treated as pointing at the start of the head block. An
/// empty queue is left untouched.
pub fn reconcile(format: &AudioFormat, queue: &mut InputQueue, start: Mtime) -> Alignment {
    let Some(head) = queue.front() else {
        return Alignment::Kept { offset: 0 };
    };
    let head_len = head.len();
    let expected = expected_offset(format, head.pts, start);

    let recorded = queue.cursor().unwrap_or(0);
    let bytes_per_frame = format.bytes_per_frame as i64;
    let recorded_i = recorded as i64;

    if expected + bytes_per_frame > recorded_i && expected < bytes_per_frame + recorded_i {
        queue.set_cursor(Some(recorded));
        return Alignment::Kept { offset: recorded };
    }

    warn!("Mixer start is not output start ({})", expected - recorded_i);

    let rounded = expected / bytes_per_frame * bytes_per_frame;
    if rounded < 0 {
        return Alignment::Negative { offset: rounded };
    }

    let offset = (rounded as usize).min(head_len);
    queue.set_cursor(Some(offset));
    Alignment::Realigned { offset }
}
