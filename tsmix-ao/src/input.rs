//! Mixer input: timestamped block queue and mix cursor
//!
//! ```text
//! Decoder ──push()──▶ [ block | block | block ... ] ──▶ Mixer
//!                       ▲
//!                       └─ cursor: byte offset of the next sample to mix
//!                          inside the oldest block (None = recompute)
//! ```
//!
//! The queue and cursor live behind the input-side lock. The decoder holds it
//! only to append or flush; the mixer holds it for a whole cycle so blocks are
//! never mutated while being validated or read.

use crate::audio::AudioBlock;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::trace;
use tsmix_common::timing::Mtime;

/// Ordered block queue plus the mix cursor into its head
#[derive(Debug, Default)]
pub struct InputQueue {
    blocks: VecDeque<AudioBlock>,

    /// Byte offset into `blocks[0]` where the next mix resumes
    cursor: Option<usize>,
}

impl InputQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a block at the tail
    pub fn push(&mut self, block: AudioBlock) {
        self.blocks.push_back(block);
    }

    /// Oldest retained block
    pub fn front(&self) -> Option<&AudioBlock> {
        self.blocks.front()
    }

    /// Block at `index` from the head
    pub fn get(&self, index: usize) -> Option<&AudioBlock> {
        self.blocks.get(index)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AudioBlock> {
        self.blocks.iter()
    }

    /// Remove the head block, invalidating the cursor
    pub fn pop_front(&mut self) -> Option<AudioBlock> {
        let block = self.blocks.pop_front()?;
        self.cursor = None;
        Some(block)
    }

    /// Drop the `count` oldest blocks and return how many were removed
    pub fn discard_front(&mut self, count: usize) -> usize {
        let count = count.min(self.blocks.len());
        if count > 0 {
            self.blocks.drain(..count);
            self.cursor = None;
        }
        count
    }

    /// Remove every block and reset the cursor
    pub fn clear(&mut self) {
        self.blocks.clear();
        self.cursor = None;
    }

    /// Current mix cursor (byte offset into the head block)
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn set_cursor(&mut self, cursor: Option<usize>) {
        self.cursor = cursor;
    }

    /// Timestamps of queued blocks, head first
    pub fn timestamps(&self) -> Vec<Mtime> {
        self.blocks.iter().map(|b| b.pts).collect()
    }

    /// Sum of queued block durations
    pub fn queued_duration(&self) -> Mtime {
        self.blocks.iter().map(|b| b.length).sum()
    }
}

/// Shared mixer input guarded by the input-side lock
#[derive(Debug, Default)]
pub struct MixerInput {
    queue: Mutex<InputQueue>,

    /// Set by the input owner to stop mixing without flushing
    paused: AtomicBool,
}

impl MixerInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the input-side lock
    ///
    /// A poisoned lock is recovered: every queue operation leaves the queue
    /// structurally valid, so a panic elsewhere cannot corrupt it.
    pub fn lock(&self) -> MutexGuard<'_, InputQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a decoded block (producer side)
    pub fn push(&self, block: AudioBlock) {
        let mut queue = self.lock();
        if let Some(last) = queue.blocks.back() {
            if block.pts != last.end() {
                trace!(
                    "Input block at {} does not follow previous end {} ({:+})",
                    block.pts,
                    last.end(),
                    block.pts - last.end()
                );
            }
        }
        queue.push(block);
    }

    /// Drop all queued blocks and reset the cursor
    pub fn flush(&self) {
        self.lock().clear();
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Number of queued blocks
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
