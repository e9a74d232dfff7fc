//! Mix scheduler
//!
//! One [`Mixer`] instance is bound to one output. Each call to
//! [`Mixer::run_cycle`] decides whether enough correctly-timed input is
//! queued to produce exactly one output period, repairs the input queue when
//! timestamps drift, and publishes the mixed buffer to the output FIFO.
//!
//! # Cycle
//!
//! ```text
//! paused?                      → Suspended(Paused)           (atomic, no lock)
//! ── output lock ─────────────────────────────────────────────────────────────
//! clock late?                  → reset FIFO, clock unset
//! copy clock date
//! ── input lock ──────────────────────────────────────────────────────────────
//! queue empty?                 → Suspended(NoInput)
//! clock unset?                 → seed start from first on-time block
//! end = start + period
//! continuity check [start,end) → Suspended(InsufficientData)
//! reconcile cursor (linear)    → negative: defer output reset, Suspended(ClockReset)
//! head burst at start? (non-linear) → otherwise: defer output reset, Suspended(ClockReset)
//! mix                          → Suspended(MixFailed)
//! ── output lock ─────────────────────────────────────────────────────────────
//! apply deferred reset, or push buffer (advances clock) → Published
//! ```
//!
//! The input and output locks are never held at the same time.

pub mod continuity;
pub mod functions;
pub mod reconcile;
pub mod service;

pub use continuity::{ContinuityChecker, Coverage, Repairs};
pub use functions::{negotiate, MixFunction, MixerKind};
pub use reconcile::Alignment;
pub use service::{MixerService, VolumeControl};

use crate::audio::AudioFormat;
use crate::clock::TimeSource;
use crate::error::{MixerError, Result};
use crate::input::MixerInput;
use crate::output::OutputFifo;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};
use tsmix_common::timing::Mtime;
use uuid::Uuid;

/// Default output period in samples
pub const DEFAULT_PERIOD_SAMPLES: u32 = 1024;

/// Default continuity tolerance (clock units)
pub const DEFAULT_CONTINUITY_TOLERANCE: Mtime = 1;

/// Timing parameters of one mixer instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MixerSettings {
    /// Samples produced per cycle
    pub period_samples: u32,

    /// Maximum timestamp mismatch between adjacent blocks still treated as contiguous
    pub continuity_tolerance: Mtime,

    /// How far behind real time the output clock or a seeding block may lag
    pub late_tolerance: Mtime,
}

impl Default for MixerSettings {
    fn default() -> Self {
        Self {
            period_samples: DEFAULT_PERIOD_SAMPLES,
            continuity_tolerance: DEFAULT_CONTINUITY_TOLERANCE,
            late_tolerance: 0,
        }
    }
}

/// Everything a mixer instance is bound to
#[derive(Clone)]
pub struct MixerContext {
    /// Output format (fixed for the instance lifetime)
    pub format: AudioFormat,

    /// Shared input queue (input-side lock)
    pub input: Arc<MixerInput>,

    /// Shared output FIFO and clock (output-side lock)
    pub output: Arc<OutputFifo>,

    /// Real-time clock used for lateness checks
    pub time: Arc<dyn TimeSource>,

    /// Period and tolerances
    pub settings: MixerSettings,
}

impl MixerContext {
    /// Context with default settings
    pub fn new(
        format: AudioFormat,
        input: Arc<MixerInput>,
        output: Arc<OutputFifo>,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            format,
            input,
            output,
            time,
            settings: MixerSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: MixerSettings) -> Self {
        self.settings = settings;
        self
    }
}

/// Why a cycle produced no output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SuspendReason {
    /// Input paused by its owner
    Paused,

    /// Input queue is empty
    NoInput,

    /// Queue does not yet cover a full period without gaps
    InsufficientData,

    /// Output start precedes all retained input; output was reset
    ClockReset,

    /// Mix function produced nothing
    MixFailed,
}

/// Result of one scheduling cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// One buffer of `length` starting at `start` was pushed to the output
    Published { start: Mtime, length: Mtime },

    Suspended(SuspendReason),
}

impl CycleOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, CycleOutcome::Published { .. })
    }
}

/// Per-instance counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MixerStats {
    /// Cycles run
    pub cycles: u64,

    /// Buffers published
    pub published: u64,

    /// Cycles that produced no output
    pub suspended: u64,

    /// Output clock found late and reset
    pub late_output_resets: u64,

    /// Blocks trashed while seeding (started before now)
    pub dropped_late: u64,

    /// Blocks trashed for ending before the output start
    pub dropped_past: u64,

    /// Blocks trashed ahead of a timestamp discontinuity
    pub dropped_gap: u64,

    /// Mix cursor moved by the reconciler
    pub realignments: u64,

    /// Output reset after a negative byte offset
    pub offset_resets: u64,

    /// Mix function produced nothing
    pub mix_failures: u64,
}

impl MixerStats {
    fn record_repairs(&mut self, repairs: &Repairs) {
        self.dropped_late += repairs.late as u64;
        self.dropped_past += repairs.past as u64;
        self.dropped_gap += repairs.gap as u64;
    }

    /// Total input blocks discarded by continuity repairs
    pub fn dropped_blocks(&self) -> u64 {
        self.dropped_late + self.dropped_past + self.dropped_gap
    }
}

/// Timestamp-synchronized mixer bound to one output
pub struct Mixer {
    id: Uuid,
    format: AudioFormat,
    input: Arc<MixerInput>,
    output: Arc<OutputFifo>,
    time: Arc<dyn TimeSource>,
    settings: MixerSettings,
    checker: ContinuityChecker,
    mix_fn: Box<dyn MixFunction>,
    stats: MixerStats,
}

impl std::fmt::Debug for Mixer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mixer")
            .field("id", &self.id)
            .field("format", &self.format)
            .field("settings", &self.settings)
            .field("mix_fn", &self.mix_fn.name())
            .field("stats", &self.stats)
            .finish()
    }
}

impl Mixer {
    /// Create a mixer, negotiating a built-in mix function for the format
    ///
    /// # Errors
    ///
    /// [`MixerError::NoSuitableMixer`] if no built-in mix function supports
    /// the output format; [`MixerError::InvalidFormat`] for a zero period or
    /// a non-linear period other than the burst length.
    pub fn create(ctx: MixerContext) -> Result<Self> {
        let mix_fn = negotiate(&ctx.format)?;
        Self::with_mix_function(ctx, mix_fn)
    }

    /// Create a mixer using a caller-supplied mix function
    pub fn with_mix_function(ctx: MixerContext, mix_fn: Box<dyn MixFunction>) -> Result<Self> {
        if ctx.settings.period_samples == 0 {
            return Err(MixerError::InvalidFormat(
                "period_samples must be > 0".to_string(),
            ));
        }
        if ctx.format.is_non_linear() && ctx.settings.period_samples != ctx.format.frame_length {
            return Err(MixerError::InvalidFormat(format!(
                "period_samples must equal the {} sample burst length for {:?}",
                ctx.format.frame_length, ctx.format.sample_format
            )));
        }

        let id = Uuid::new_v4();
        info!(
            "Mixer {} created: {:?} @ {} Hz, {} ch, period {} samples, mix function {}",
            id,
            ctx.format.sample_format,
            ctx.format.rate,
            ctx.format.channels,
            ctx.settings.period_samples,
            mix_fn.name()
        );

        Ok(Self {
            id,
            format: ctx.format,
            input: ctx.input,
            output: ctx.output,
            time: ctx.time,
            settings: ctx.settings,
            checker: ContinuityChecker::new(ctx.settings.continuity_tolerance),
            mix_fn,
            stats: MixerStats::default(),
        })
    }

    /// Tear the instance down and return its counters
    ///
    /// Consuming `self` guarantees no cycle is in flight.
    pub fn destroy(self) -> MixerStats {
        info!(
            "Mixer {} destroyed after {} cycles ({} published, {} blocks dropped)",
            self.id,
            self.stats.cycles,
            self.stats.published,
            self.stats.dropped_blocks()
        );
        self.stats
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn format(&self) -> &AudioFormat {
        &self.format
    }

    pub fn settings(&self) -> &MixerSettings {
        &self.settings
    }

    pub fn stats(&self) -> &MixerStats {
        &self.stats
    }

    pub fn input(&self) -> &Arc<MixerInput> {
        &self.input
    }

    pub fn output(&self) -> &Arc<OutputFifo> {
        &self.output
    }

    /// Run cycles until one suspends; returns the number of published buffers
    pub fn run(&mut self, volume: f32) -> usize {
        let mut published = 0;
        while self.run_cycle(volume).is_published() {
            published += 1;
        }
        published
    }

    /// Attempt to produce one output period
    ///
    /// Never blocks waiting for input: if the queue cannot cover the next
    /// period the cycle suspends and the caller retries later.
    pub fn run_cycle(&mut self, volume: f32) -> CycleOutcome {
        self.stats.cycles += 1;

        if self.input.is_paused() {
            return self.suspend(SuspendReason::Paused);
        }

        let now = self.time.now();
        let late_tolerance = self.settings.late_tolerance;

        let mut date = {
            let mut output = self.output.lock();
            if output.clock().is_late(now, late_tolerance) {
                warn!(
                    "Output PTS is late ({}), resetting output",
                    now - output.clock().next_start()
                );
                output.reset(0);
                self.stats.late_output_resets += 1;
            }
            output.clock().date()
        };

        let period = self.settings.period_samples;
        let mut repairs = Repairs::default();
        let mut reset_output = false;

        let result = {
            let mut queue = self.input.lock();

            'cycle: {
                if queue.is_empty() {
                    break 'cycle Err(SuspendReason::NoInput);
                }

                if !date.is_set() {
                    match self.checker.seed(&mut queue, now, late_tolerance, &mut repairs) {
                        Some(pts) => date.set(pts),
                        None => break 'cycle Err(SuspendReason::InsufficientData),
                    }
                }

                let start = date.get();
                let end = date.increment(period);

                if self.checker.check(&mut queue, start, end, &mut repairs) == Coverage::Insufficient
                {
                    trace!("Not enough input to cover [{}, {})", start, end);
                    break 'cycle Err(SuspendReason::InsufficientData);
                }

                if self.format.is_non_linear() {
                    // Bursts cannot be split: the head must start the span
                    let head_pts = queue.front().map_or(start, |head| head.pts);
                    if (head_pts - start).abs() > self.checker.tolerance() {
                        warn!("Burst at {} does not start output span at {}", head_pts, start);
                        reset_output = true;
                        break 'cycle Err(SuspendReason::ClockReset);
                    }
                } else {
                    match reconcile::reconcile(&self.format, &mut queue, start) {
                        Alignment::Kept { .. } => {}
                        Alignment::Realigned { offset } => {
                            debug!("Mix cursor realigned to byte {}", offset);
                            self.stats.realignments += 1;
                        }
                        Alignment::Negative { offset } => {
                            warn!("Mixer start precedes input by {} bytes", -offset);
                            reset_output = true;
                            break 'cycle Err(SuspendReason::ClockReset);
                        }
                    }
                }

                match self.mix_fn.mix(&mut queue, &self.format, period, volume) {
                    Some(mut block) => {
                        block.nb_samples = period;
                        block.pts = start;
                        block.length = end - start;
                        Ok(block)
                    }
                    None => Err(SuspendReason::MixFailed),
                }
            }
        };

        self.stats.record_repairs(&repairs);

        if reset_output {
            self.output.reset(0);
            self.stats.offset_resets += 1;
        }

        match result {
            Ok(block) => {
                let (start, length) = (block.pts, block.length);
                self.output.push(block);
                self.stats.published += 1;
                trace!("Published [{}, {})", start, start + length);
                CycleOutcome::Published { start, length }
            }
            Err(SuspendReason::MixFailed) => {
                warn!("Mix function {} produced no output", self.mix_fn.name());
                self.stats.mix_failures += 1;
                self.suspend(SuspendReason::MixFailed)
            }
            Err(reason) => self.suspend(reason),
        }
    }

    fn suspend(&mut self, reason: SuspendReason) -> CycleOutcome {
        self.stats.suspended += 1;
        trace!("Cycle suspended: {:?}", reason);
        CycleOutcome::Suspended(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioBlock, SampleFormat};
    use crate::clock::ManualClock;

    fn f32_mono_context(clock: Arc<ManualClock>, period: u32) -> MixerContext {
        let format = AudioFormat::linear(SampleFormat::F32, 1_000, 1).unwrap();
        MixerContext::new(
            format,
            Arc::new(MixerInput::new()),
            Arc::new(OutputFifo::new(format.rate)),
            clock,
        )
        .with_settings(MixerSettings {
            period_samples: period,
            ..MixerSettings::default()
        })
    }

    /// 1 kHz mono f32 block: one sample per millisecond
    fn ms_block(pts: Mtime, samples: u32) -> AudioBlock {
        AudioBlock::new(
            vec![0; samples as usize * 4],
            samples,
            pts,
            samples as Mtime * 1_000,
        )
    }

    #[test]
    fn test_zero_period_rejected() {
        let clock = Arc::new(ManualClock::new(1));
        let ctx = f32_mono_context(clock, 0);
        assert!(matches!(Mixer::create(ctx), Err(MixerError::InvalidFormat(_))));
    }

    #[test]
    fn test_passthrough_period_must_match_burst() {
        let format = AudioFormat::spdif(48_000).unwrap();
        let ctx = |period| {
            MixerContext::new(
                format,
                Arc::new(MixerInput::new()),
                Arc::new(OutputFifo::new(format.rate)),
                Arc::new(ManualClock::new(1)),
            )
            .with_settings(MixerSettings {
                period_samples: period,
                ..MixerSettings::default()
            })
        };

        assert!(matches!(Mixer::create(ctx(1024)), Err(MixerError::InvalidFormat(_))));
        assert!(matches!(
            Mixer::with_mix_function(ctx(1024), Box::new(functions::PassthroughMixer)),
            Err(MixerError::InvalidFormat(_))
        ));
        assert!(Mixer::create(ctx(1536)).is_ok());
    }

    #[test]
    fn test_empty_input_suspends_with_no_input() {
        let clock = Arc::new(ManualClock::new(1));
        let mut mixer = Mixer::create(f32_mono_context(clock, 10)).unwrap();

        assert_eq!(
            mixer.run_cycle(1.0),
            CycleOutcome::Suspended(SuspendReason::NoInput)
        );
        assert_eq!(mixer.stats().suspended, 1);
    }

    #[test]
    fn test_first_cycle_seeds_from_head_block() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let mut mixer = Mixer::create(f32_mono_context(clock, 10)).unwrap();
        mixer.input().push(ms_block(2_000_000, 20));

        assert_eq!(
            mixer.run_cycle(1.0),
            CycleOutcome::Published { start: 2_000_000, length: 10_000 }
        );
        assert_eq!(mixer.output().next_start(), 2_010_000);
        assert_eq!(mixer.input().lock().cursor(), Some(40));
    }

    #[test]
    fn test_run_drains_until_suspended() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let mut mixer = Mixer::create(f32_mono_context(clock, 10)).unwrap();
        mixer.input().push(ms_block(2_000_000, 25));

        assert_eq!(mixer.run(1.0), 2);
        assert_eq!(mixer.output().len(), 2);

        let stats = mixer.destroy();
        assert_eq!(stats.published, 2);
        assert_eq!(stats.cycles, 3);
        assert_eq!(stats.suspended, 1);
    }
}
