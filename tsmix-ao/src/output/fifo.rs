//! Output FIFO
//!
//! Owner of the output clock. Mixed buffers are pushed here and held until
//! the device layer pops them; each push advances the clock by the buffer's
//! sample count. Everything is guarded by the output-side lock, which the
//! mixer holds only briefly (never across a mix).
//!
//! ```text
//! push(buf):  clock unset → clock = buf.pts
//!             buf.pts = clock; clock += buf.nb_samples; buf.length = clock - buf.pts
//! reset(t):   drop all buffered output; clock = t
//! ```

use crate::audio::AudioBlock;
use crate::output::OutputClock;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;
use tsmix_common::timing::Mtime;

/// Buffered output plus the clock, as seen under the output-side lock
#[derive(Debug)]
pub struct OutputFifoState {
    clock: OutputClock,
    buffers: VecDeque<AudioBlock>,
}

impl OutputFifoState {
    fn new(rate: u32) -> Self {
        Self {
            clock: OutputClock::new(rate),
            buffers: VecDeque::new(),
        }
    }

    pub fn clock(&self) -> &OutputClock {
        &self.clock
    }

    /// Drop all buffered output and set the clock to `date` (0 = unset)
    pub fn reset(&mut self, date: Mtime) {
        if !self.buffers.is_empty() {
            debug!("Clearing {} buffered output blocks", self.buffers.len());
        }
        self.buffers.clear();
        self.clock.reset(date);
    }

    /// Append a mixed buffer and advance the clock past it
    pub fn push(&mut self, mut block: AudioBlock) {
        if self.clock.is_set() {
            block.pts = self.clock.next_start();
        } else {
            self.clock.reset(block.pts);
        }
        let end = self.clock.advance(block.nb_samples);
        block.length = end - block.pts;
        self.buffers.push_back(block);
    }

    pub fn pop(&mut self) -> Option<AudioBlock> {
        self.buffers.pop_front()
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

/// Shared output FIFO guarded by the output-side lock
#[derive(Debug)]
pub struct OutputFifo {
    state: Mutex<OutputFifoState>,
}

impl OutputFifo {
    /// Create an empty FIFO with an unset clock at `rate` Hz
    pub fn new(rate: u32) -> Self {
        Self {
            state: Mutex::new(OutputFifoState::new(rate)),
        }
    }

    /// Acquire the output-side lock
    pub fn lock(&self) -> MutexGuard<'_, OutputFifoState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start timestamp of the next output buffer (0 = unset)
    pub fn next_start(&self) -> Mtime {
        self.lock().clock.next_start()
    }

    /// Drop buffered output and set the clock
    pub fn reset(&self, date: Mtime) {
        self.lock().reset(date);
    }

    /// Publish a mixed buffer (advances the clock)
    pub fn push(&self, block: AudioBlock) {
        self.lock().push(block);
    }

    /// Take the oldest buffered block
    pub fn pop(&self) -> Option<AudioBlock> {
        self.lock().pop()
    }

    /// Take the oldest block if it starts at or before `deadline`
    pub fn pop_due(&self, deadline: Mtime) -> Option<AudioBlock> {
        let mut state = self.lock();
        match state.buffers.front() {
            Some(block) if block.pts <= deadline => state.buffers.pop_front(),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(nb_samples: u32, pts: Mtime, length: Mtime) -> AudioBlock {
        AudioBlock::new(vec![0; nb_samples as usize * 4], nb_samples, pts, length)
    }

    #[test]
    fn test_first_push_sets_clock_from_block() {
        let fifo = OutputFifo::new(48_000);
        fifo.push(block(48, 5_000, 1_000));
        assert_eq!(fifo.next_start(), 6_000);
        assert_eq!(fifo.len(), 1);
    }

    #[test]
    fn test_push_restamps_against_running_clock() {
        let fifo = OutputFifo::new(48_000);
        fifo.push(block(48, 5_000, 1_000));
        // Second block carries a slightly wrong pts: the clock wins
        fifo.push(block(48, 6_003, 1_000));

        fifo.pop();
        let second = fifo.pop().unwrap();
        assert_eq!(second.pts, 6_000);
        assert_eq!(second.length, 1_000);
        assert_eq!(fifo.next_start(), 7_000);
    }

    #[test]
    fn test_reset_clears_buffers_and_unsets_clock() {
        let fifo = OutputFifo::new(48_000);
        fifo.push(block(48, 5_000, 1_000));
        fifo.reset(0);
        assert!(fifo.is_empty());
        assert_eq!(fifo.next_start(), 0);
    }

    #[test]
    fn test_pop_due_honours_deadline() {
        let fifo = OutputFifo::new(48_000);
        fifo.push(block(48, 5_000, 1_000));

        assert!(fifo.pop_due(4_999).is_none());
        assert_eq!(fifo.pop_due(5_000).unwrap().pts, 5_000);
        assert!(fifo.pop_due(i64::MAX).is_none());
    }
}
