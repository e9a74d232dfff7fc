//! Test helpers for mixer integration tests
//!
//! Builds a mixer wired to a manual clock so tests control "now" exactly.

#![allow(dead_code)]

use std::sync::Arc;
use tsmix_ao::audio::{AudioBlock, AudioFormat, SampleFormat};
use tsmix_ao::clock::ManualClock;
use tsmix_ao::input::MixerInput;
use tsmix_ao::mixer::{Mixer, MixerContext, MixerSettings};
use tsmix_ao::output::OutputFifo;
use tsmix_common::timing::{AudioDate, Mtime};

/// Mixer plus handles on everything it is bound to
pub struct Harness {
    pub mixer: Mixer,
    pub input: Arc<MixerInput>,
    pub output: Arc<OutputFifo>,
    pub clock: Arc<ManualClock>,
}

/// Mono f32 at 1 MHz: one sample per clock unit, so sample counts and
/// timestamps read the same
pub fn unit_format() -> AudioFormat {
    AudioFormat::linear(SampleFormat::F32, 1_000_000, 1).unwrap()
}

/// 16-bit stereo at 44.1 kHz (4 bytes per frame)
pub fn cd_format() -> AudioFormat {
    AudioFormat::linear(SampleFormat::S16, 44_100, 2).unwrap()
}

/// Settings with the given period and default tolerances
pub fn settings(period_samples: u32) -> MixerSettings {
    MixerSettings {
        period_samples,
        ..MixerSettings::default()
    }
}

/// Build a mixer for `format` with the clock reading `now`
pub fn harness(format: AudioFormat, settings: MixerSettings, now: Mtime) -> Harness {
    let input = Arc::new(MixerInput::new());
    let output = Arc::new(OutputFifo::new(format.rate));
    let clock = Arc::new(ManualClock::new(now));

    let ctx = MixerContext::new(format, Arc::clone(&input), Arc::clone(&output), clock.clone())
        .with_settings(settings);
    let mixer = Mixer::create(ctx).unwrap();

    Harness {
        mixer,
        input,
        output,
        clock,
    }
}

/// Silent block spanning `[pts, end)` in `format`
pub fn silent_block(format: &AudioFormat, pts: Mtime, end: Mtime) -> AudioBlock {
    let samples = tsmix_common::timing::mtime_to_samples(end - pts, format.rate) as u32;
    AudioBlock::new(vec![0; format.bytes_for_samples(samples)], samples, pts, end - pts)
}

/// `count` gap-free blocks of `block_samples` each, starting at `start`
pub fn contiguous_blocks(
    format: &AudioFormat,
    start: Mtime,
    block_samples: u32,
    count: usize,
) -> Vec<AudioBlock> {
    let mut date = AudioDate::new(format.rate);
    date.set(start);

    (0..count)
        .map(|_| {
            let pts = date.get();
            let end = date.increment(block_samples);
            AudioBlock::new(
                vec![0; format.bytes_for_samples(block_samples)],
                block_samples,
                pts,
                end - pts,
            )
        })
        .collect()
}

/// Push every block onto the mixer input
pub fn feed(input: &MixerInput, blocks: impl IntoIterator<Item = AudioBlock>) {
    for block in blocks {
        input.push(block);
    }
}

/// Drain the output FIFO
pub fn drain_output(output: &OutputFifo) -> Vec<AudioBlock> {
    std::iter::from_fn(|| output.pop()).collect()
}
