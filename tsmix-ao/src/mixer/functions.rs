//! Pluggable mix functions
//!
//! A mix function turns the queued input (starting at the mix cursor) into
//! one output buffer of the requested sample count and applies gain. The
//! scheduler has already validated timing, so a mix function only copies and
//! scales samples.
//!
//! Built-in variants are chosen by format capability when a mixer is created
//! ([`negotiate`]):
//!
//! | Variant              | Formats                     | Gain |
//! |----------------------|-----------------------------|------|
//! | [`Float32Mixer`]     | F32 linear PCM              | yes  |
//! | [`Int16Mixer`]       | S16 linear PCM              | yes  |
//! | [`PassthroughMixer`] | non-linear (S/PDIF)         | no   |

use crate::audio::{AudioBlock, AudioFormat, SampleFormat};
use crate::error::{MixerError, Result};
use crate::input::InputQueue;
use tracing::{debug, trace};

/// Combines queued input into one output buffer
pub trait MixFunction: Send {
    /// Short identifier for logs
    fn name(&self) -> &'static str;

    /// Produce `samples` samples from `queue` at gain `volume`
    ///
    /// Consumes input from the mix cursor onward, popping blocks that are
    /// fully read and leaving the cursor at the first unread byte. Returns
    /// `None` if no output could be produced. The returned block is stamped
    /// by the caller.
    fn mix(
        &mut self,
        queue: &mut InputQueue,
        format: &AudioFormat,
        samples: u32,
        volume: f32,
    ) -> Option<AudioBlock>;
}

/// Built-in mix function variants, in negotiation order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixerKind {
    Float32,
    Int16,
    Passthrough,
}

impl MixerKind {
    const ALL: [MixerKind; 3] = [MixerKind::Float32, MixerKind::Int16, MixerKind::Passthrough];

    /// Whether this variant can mix `format`
    pub fn supports(self, format: &AudioFormat) -> bool {
        match self {
            MixerKind::Float32 => is_packed_linear(format, SampleFormat::F32),
            MixerKind::Int16 => is_packed_linear(format, SampleFormat::S16),
            MixerKind::Passthrough => format.is_non_linear(),
        }
    }

    fn instantiate(self) -> Box<dyn MixFunction> {
        match self {
            MixerKind::Float32 => Box::new(Float32Mixer),
            MixerKind::Int16 => Box::new(Int16Mixer),
            MixerKind::Passthrough => Box::new(PassthroughMixer),
        }
    }
}

/// Interleaved samples with one-sample frames and no padding
fn is_packed_linear(format: &AudioFormat, sample_format: SampleFormat) -> bool {
    let Some(bytes_per_sample) = sample_format.bytes_per_sample() else {
        return false;
    };
    format.sample_format == sample_format
        && format.frame_length == 1
        && format.bytes_per_frame == bytes_per_sample * format.channels as u32
}

/// Pick the first built-in mix function supporting `format`
///
/// # Errors
///
/// Returns [`MixerError::NoSuitableMixer`] when no variant supports the
/// format (e.g. inconsistent frame geometry).
pub fn negotiate(format: &AudioFormat) -> Result<Box<dyn MixFunction>> {
    let kind = MixerKind::ALL
        .into_iter()
        .find(|kind| kind.supports(format))
        .ok_or(MixerError::NoSuitableMixer {
            format: format.sample_format,
        })?;
    debug!("Negotiated {:?} mix function for {:?}", kind, format);
    Ok(kind.instantiate())
}

/// Copy `bytes` bytes of linear PCM starting at the mix cursor
///
/// Blocks are popped once fully read. If the queue runs dry after some data
/// was copied, the remainder is filled with silence (all-zero bytes are
/// silence for every linear format here).
fn gather_linear(queue: &mut InputQueue, bytes: usize) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(bytes);
    let mut cursor = queue.cursor().unwrap_or(0);

    while out.len() < bytes {
        let Some(head) = queue.front() else {
            break;
        };
        let from = cursor.min(head.len());
        let take = (head.len() - from).min(bytes - out.len());
        out.extend_from_slice(&head.data[from..from + take]);
        cursor = from + take;

        if cursor >= head.len() {
            queue.pop_front();
            cursor = 0;
        }
    }

    if out.is_empty() {
        return None;
    }
    if out.len() < bytes {
        trace!("Input short by {} bytes, padding with silence", bytes - out.len());
        out.resize(bytes, 0);
    }

    let next_cursor = if queue.is_empty() { None } else { Some(cursor) };
    queue.set_cursor(next_cursor);
    Some(out)
}

/// 32-bit float mixer with gain
#[derive(Debug, Default)]
pub struct Float32Mixer;

impl MixFunction for Float32Mixer {
    fn name(&self) -> &'static str {
        "float32"
    }

    fn mix(
        &mut self,
        queue: &mut InputQueue,
        format: &AudioFormat,
        samples: u32,
        volume: f32,
    ) -> Option<AudioBlock> {
        let mut data = gather_linear(queue, format.bytes_for_samples(samples))?;

        if volume != 1.0 {
            for chunk in data.chunks_exact_mut(4) {
                let sample = f32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                chunk.copy_from_slice(&(sample * volume).to_ne_bytes());
            }
        }

        Some(AudioBlock::new(data, samples, 0, 0))
    }
}

/// Signed 16-bit mixer with clamped gain
#[derive(Debug, Default)]
pub struct Int16Mixer;

impl MixFunction for Int16Mixer {
    fn name(&self) -> &'static str {
        "int16"
    }

    fn mix(
        &mut self,
        queue: &mut InputQueue,
        format: &AudioFormat,
        samples: u32,
        volume: f32,
    ) -> Option<AudioBlock> {
        let mut data = gather_linear(queue, format.bytes_for_samples(samples))?;

        if volume != 1.0 {
            for chunk in data.chunks_exact_mut(2) {
                let sample = i16::from_ne_bytes([chunk[0], chunk[1]]) as f32;
                let scaled = (sample * volume)
                    .round()
                    .clamp(i16::MIN as f32, i16::MAX as f32) as i16;
                chunk.copy_from_slice(&scaled.to_ne_bytes());
            }
        }

        Some(AudioBlock::new(data, samples, 0, 0))
    }
}

/// Compressed passthrough: hands over whole blocks, ignores gain
#[derive(Debug, Default)]
pub struct PassthroughMixer;

impl MixFunction for PassthroughMixer {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn mix(
        &mut self,
        queue: &mut InputQueue,
        _format: &AudioFormat,
        samples: u32,
        _volume: f32,
    ) -> Option<AudioBlock> {
        let block = queue.pop_front()?;
        if block.nb_samples != samples {
            trace!(
                "Passthrough block carries {} samples, period is {}",
                block.nb_samples,
                samples
            );
        }
        Some(AudioBlock::new(block.data, samples, 0, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f32_block(samples: &[f32], pts: i64) -> AudioBlock {
        let data = samples.iter().flat_map(|s| s.to_ne_bytes()).collect();
        AudioBlock::new(data, samples.len() as u32, pts, samples.len() as i64)
    }

    fn as_f32(data: &[u8]) -> Vec<f32> {
        data.chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    fn mono_f32() -> AudioFormat {
        AudioFormat::linear(SampleFormat::F32, 48_000, 1).unwrap()
    }

    #[test]
    fn test_negotiation_picks_variant_by_format() {
        let f32_fmt = mono_f32();
        let s16_fmt = AudioFormat::linear(SampleFormat::S16, 48_000, 2).unwrap();
        let spdif = AudioFormat::spdif(48_000).unwrap();

        assert_eq!(negotiate(&f32_fmt).unwrap().name(), "float32");
        assert_eq!(negotiate(&s16_fmt).unwrap().name(), "int16");
        assert_eq!(negotiate(&spdif).unwrap().name(), "passthrough");
    }

    #[test]
    fn test_negotiation_fails_for_padded_geometry() {
        // 3 bytes per stereo f32 frame cannot be mixed
        let odd = AudioFormat::new(SampleFormat::F32, 48_000, 2, 3, 1).unwrap();
        assert!(matches!(
            negotiate(&odd),
            Err(MixerError::NoSuitableMixer { format: SampleFormat::F32 })
        ));
    }

    #[test]
    fn test_float_mix_spans_blocks_and_leaves_cursor() {
        let format = mono_f32();
        let mut queue = InputQueue::new();
        queue.push(f32_block(&[1.0, 2.0, 3.0], 0));
        queue.push(f32_block(&[4.0, 5.0, 6.0], 3));
        queue.set_cursor(Some(4)); // skip first sample

        let out = Float32Mixer.mix(&mut queue, &format, 4, 1.0).unwrap();
        assert_eq!(as_f32(&out.data), vec![2.0, 3.0, 4.0, 5.0]);
        assert_eq!(out.nb_samples, 4);

        // First block consumed, cursor inside the second
        assert_eq!(queue.timestamps(), vec![3]);
        assert_eq!(queue.cursor(), Some(8));
    }

    #[test]
    fn test_float_mix_applies_volume() {
        let format = mono_f32();
        let mut queue = InputQueue::new();
        queue.push(f32_block(&[0.5, -1.0], 0));

        let out = Float32Mixer.mix(&mut queue, &format, 2, 0.5).unwrap();
        assert_eq!(as_f32(&out.data), vec![0.25, -0.5]);
        assert!(queue.is_empty());
        assert_eq!(queue.cursor(), None);
    }

    #[test]
    fn test_short_input_padded_with_silence() {
        let format = mono_f32();
        let mut queue = InputQueue::new();
        queue.push(f32_block(&[1.0], 0));

        let out = Float32Mixer.mix(&mut queue, &format, 3, 1.0).unwrap();
        assert_eq!(as_f32(&out.data), vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_empty_input_fails() {
        let format = mono_f32();
        let mut queue = InputQueue::new();
        assert!(Float32Mixer.mix(&mut queue, &format, 3, 1.0).is_none());
    }

    #[test]
    fn test_int16_gain_rounds_to_nearest() {
        let format = AudioFormat::linear(SampleFormat::S16, 48_000, 1).unwrap();
        let data = [i16::MAX, -100, 1000]
            .iter()
            .flat_map(|s| s.to_ne_bytes())
            .collect();
        let mut queue = InputQueue::new();
        queue.push(AudioBlock::new(data, 3, 0, 62));

        let out = Int16Mixer.mix(&mut queue, &format, 3, 0.5).unwrap();
        let samples: Vec<i16> = out
            .data
            .chunks_exact(2)
            .map(|c| i16::from_ne_bytes([c[0], c[1]]))
            .collect();
        assert_eq!(samples, vec![16_384, -50, 500]);
    }

    #[test]
    fn test_passthrough_pops_whole_block() {
        let format = AudioFormat::spdif(48_000).unwrap();
        let mut queue = InputQueue::new();
        queue.push(AudioBlock::new(vec![7; 6144], 1536, 100, 32_000));
        queue.push(AudioBlock::new(vec![8; 6144], 1536, 32_100, 32_000));
        queue.set_cursor(Some(12));

        let out = PassthroughMixer.mix(&mut queue, &format, 1536, 0.1).unwrap();
        assert_eq!(out.data, vec![7; 6144]);
        assert_eq!(queue.timestamps(), vec![32_100]);
        assert_eq!(queue.cursor(), None);
    }
}
