//! End-to-end simulation
//!
//! Wires a synthetic decoder, the mixer service and a simulated device
//! around one [`Mixer`] on the real-time clock:
//!
//! ```text
//! ToneSource ──(decoder task, runs lead_ms ahead)──▶ MixerInput
//!                                                        │
//!                                   MixerService (tick) ─┘──▶ OutputFifo
//!                                                                  │
//! DeviceSink ◀──(pops buffers whose pts is due)────────────────────┘
//! ```
//!
//! The decoder can inject timestamp discontinuities to exercise the
//! continuity repairs; the report counts what reached the device.

use crate::audio::{AudioBlock, AudioFormat, SampleFormat};
use crate::clock::{MonotonicClock, TimeSource};
use crate::config::{AoConfig, SimulationSection};
use crate::error::{MixerError, Result};
use crate::input::MixerInput;
use crate::mixer::{Mixer, MixerContext, MixerService, MixerStats, VolumeControl};
use crate::output::OutputFifo;
use serde::Serialize;
use std::f64::consts::TAU;
use std::sync::Arc;
use tokio::time::{interval, sleep, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};
use tsmix_common::timing::{ms_to_mtime, mtime_to_ms, AudioDate, Mtime};

/// Peak amplitude of the generated tone
const TONE_AMPLITUDE: f64 = 0.5;

/// Synthetic decoder producing timestamped tone blocks
#[derive(Debug)]
pub struct ToneSource {
    format: AudioFormat,
    block_samples: u32,
    date: AudioDate,
    end: Mtime,
    phase: f64,
    phase_step: f64,
    gap_every: u32,
    gap_us: Mtime,
    blocks: u64,
    discontinuities: u64,
}

impl ToneSource {
    /// Source whose first block starts at `start` and which stops after `duration_ms`
    pub fn new(format: AudioFormat, sim: &SimulationSection, start: Mtime) -> Self {
        // Compressed bursts have a fixed size
        let block_samples = if format.is_non_linear() {
            format.frame_length
        } else {
            sim.block_samples.max(1)
        };

        let mut date = AudioDate::new(format.rate);
        date.set(start);

        Self {
            format,
            block_samples,
            date,
            end: start + ms_to_mtime(sim.duration_ms as i64),
            phase: 0.0,
            phase_step: sim.tone_hz as f64 / format.rate as f64,
            gap_every: sim.gap_every,
            gap_us: sim.gap_us,
            blocks: 0,
            discontinuities: 0,
        }
    }

    /// Timestamp of the next block
    pub fn next_pts(&self) -> Mtime {
        self.date.get()
    }

    pub fn is_finished(&self) -> bool {
        self.date.get() >= self.end
    }

    /// Blocks produced so far
    pub fn blocks(&self) -> u64 {
        self.blocks
    }

    /// Discontinuities injected so far
    pub fn discontinuities(&self) -> u64 {
        self.discontinuities
    }

    /// Produce the next block, or `None` once the configured duration is covered
    pub fn next_block(&mut self) -> Option<AudioBlock> {
        if self.is_finished() {
            return None;
        }

        let pts = self.date.get();
        let end = self.date.increment(self.block_samples);
        let data = self.render();
        self.blocks += 1;

        if self.gap_every > 0 && self.blocks % self.gap_every as u64 == 0 {
            debug!("Injecting {} µs discontinuity after block {}", self.gap_us, self.blocks);
            self.date.set(end + self.gap_us);
            self.discontinuities += 1;
        }

        Some(AudioBlock::new(data, self.block_samples, pts, end - pts))
    }

    fn render(&mut self) -> Vec<u8> {
        let bytes = self.format.bytes_for_samples(self.block_samples);
        let channels = self.format.channels as usize;
        let mut data = Vec::with_capacity(bytes);

        match self.format.sample_format {
            SampleFormat::F32 => {
                for _ in 0..self.block_samples {
                    let value = self.next_sample() as f32;
                    for _ in 0..channels {
                        data.extend_from_slice(&value.to_ne_bytes());
                    }
                }
            }
            SampleFormat::S16 => {
                for _ in 0..self.block_samples {
                    let value = (self.next_sample() * i16::MAX as f64) as i16;
                    for _ in 0..channels {
                        data.extend_from_slice(&value.to_ne_bytes());
                    }
                }
            }
            // Null burst payload
            SampleFormat::Spdif => data.resize(bytes, 0),
        }

        data
    }

    fn next_sample(&mut self) -> f64 {
        let value = (self.phase * TAU).sin() * TONE_AMPLITUDE;
        self.phase = (self.phase + self.phase_step).fract();
        value
    }
}

/// Simulated output device consuming buffers as they fall due
#[derive(Debug)]
pub struct DeviceSink {
    output: Arc<OutputFifo>,
    played: u64,
    played_duration: Mtime,
    discontinuities: u64,
    last_end: Option<Mtime>,
}

impl DeviceSink {
    pub fn new(output: Arc<OutputFifo>) -> Self {
        Self {
            output,
            played: 0,
            played_duration: 0,
            discontinuities: 0,
            last_end: None,
        }
    }

    /// Play every buffer starting at or before `now`; returns how many were played
    pub fn service(&mut self, now: Mtime) -> usize {
        let mut count = 0;
        while let Some(block) = self.output.pop_due(now) {
            if let Some(last_end) = self.last_end {
                if block.pts != last_end {
                    warn!("Output discontinuity: expected {}, got {}", last_end, block.pts);
                    self.discontinuities += 1;
                }
            }
            self.last_end = Some(block.end());
            self.played += 1;
            self.played_duration += block.length;
            count += 1;
        }
        count
    }

    pub fn played(&self) -> u64 {
        self.played
    }

    pub fn played_duration(&self) -> Mtime {
        self.played_duration
    }

    /// Buffers that did not start where the previous one ended
    pub fn discontinuities(&self) -> u64 {
        self.discontinuities
    }
}

/// Outcome of one simulation run
#[derive(Debug, Clone, Serialize)]
pub struct SimReport {
    pub blocks_decoded: u64,
    pub injected_discontinuities: u64,
    pub buffers_played: u64,
    pub played_ms: i64,
    pub output_discontinuities: u64,
    pub mixer: MixerStats,
}

/// Run the decoder, mixer service and device until the generated audio is played out
///
/// # Errors
///
/// Fails if the configured format has no suitable mix function or a
/// background task fails.
pub async fn run(config: &AoConfig) -> Result<SimReport> {
    let format = config.format()?;
    let time: Arc<dyn TimeSource> = Arc::new(MonotonicClock::new());
    let input = Arc::new(MixerInput::new());
    let output = Arc::new(OutputFifo::new(format.rate));
    let tick = Duration::from_millis(config.mixer.tick_interval_ms.max(1));

    let ctx = MixerContext::new(format, Arc::clone(&input), Arc::clone(&output), Arc::clone(&time))
        .with_settings(config.mixer_settings());
    let mixer = Mixer::create(ctx)?;
    let volume = Arc::new(VolumeControl::new(config.mixer.volume));
    let service = MixerService::spawn(mixer, volume, tick);

    let lead = ms_to_mtime(config.simulation.lead_ms as i64);
    let start = time.now() + lead;
    let end = start + ms_to_mtime(config.simulation.duration_ms as i64);
    info!(
        "Simulating {} ms of {:?} @ {} Hz (lead {} ms)",
        config.simulation.duration_ms, format.sample_format, format.rate, config.simulation.lead_ms
    );

    let mut source = ToneSource::new(format, &config.simulation, start);
    let decoder_input = Arc::clone(&input);
    let decoder_time = Arc::clone(&time);
    let decoder = tokio::spawn(async move {
        while !source.is_finished() {
            let horizon = decoder_time.now() + lead;
            while source.next_pts() <= horizon {
                match source.next_block() {
                    Some(block) => decoder_input.push(block),
                    None => break,
                }
            }
            sleep(tick).await;
        }
        debug!("Decoder finished after {} blocks", source.blocks());
        (source.blocks(), source.discontinuities())
    });

    let mut sink = DeviceSink::new(Arc::clone(&output));
    let mut device_tick = interval(tick);
    device_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let drain_deadline = end + 2 * ms_to_mtime(config.mixer.tick_interval_ms as i64);
    loop {
        device_tick.tick().await;
        let now = time.now();
        sink.service(now);
        if now >= drain_deadline {
            break;
        }
    }

    let mixer = service.stop().await?;
    let (blocks_decoded, injected_discontinuities) = decoder
        .await
        .map_err(|e| MixerError::Task(format!("decoder task failed: {}", e)))?;
    sink.service(time.now());

    let report = SimReport {
        blocks_decoded,
        injected_discontinuities,
        buffers_played: sink.played(),
        played_ms: mtime_to_ms(sink.played_duration()),
        output_discontinuities: sink.discontinuities(),
        mixer,
    };
    info!(
        "Simulation complete: {} blocks decoded, {} buffers played ({} ms), {} blocks dropped",
        report.blocks_decoded,
        report.buffers_played,
        report.played_ms,
        report.mixer.dropped_blocks()
    );
    Ok(report)
}
