//! # tsmix Audio Output Library (tsmix-ao)
//!
//! Timestamp-synchronized audio output mixing.
//!
//! **Purpose:** Decide, once per output period, whether enough correctly-timed
//! decoded audio is queued to produce one output buffer, repair timing drift
//! between the decoded stream and the fixed-rate output (gaps, overlaps, late
//! data, clock discontinuities), and hand finished buffers to the output FIFO.
//!
//! **Architecture:**
//!
//! ```text
//! decoder ──push──▶ MixerInput (input lock)          OutputFifo (output lock) ──pop──▶ device
//!                        │                                  ▲
//!                        ▼                                  │ push (advances clock)
//!                   Mixer::run_cycle ── continuity ── reconcile ── MixFunction
//! ```

pub mod audio;
pub mod clock;
pub mod config;
pub mod error;
pub mod input;
pub mod mixer;
pub mod output;
pub mod sim;

pub use error::{MixerError, Result};
pub use mixer::{CycleOutcome, Mixer, MixerContext, SuspendReason};
