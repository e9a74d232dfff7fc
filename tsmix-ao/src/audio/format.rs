//! Output format descriptor
//!
//! Linear PCM formats have uniformly sized samples, so any timestamp inside a
//! block maps to a byte offset (`frame_length` = 1). Non-linear formats
//! (compressed passthrough) carry opaque bursts of `frame_length` samples in
//! `bytes_per_frame` bytes and can only be consumed whole.

use crate::error::{MixerError, Result};
use serde::{Deserialize, Serialize};
use tsmix_common::timing::{samples_to_mtime, Mtime};

/// Sample encoding of an audio stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    /// 32-bit float, native endian
    F32,

    /// Signed 16-bit integer, native endian
    S16,

    /// IEC 61937 (S/PDIF) compressed passthrough
    Spdif,
}

impl SampleFormat {
    /// Bytes per single-channel sample, `None` for non-linear formats
    pub fn bytes_per_sample(self) -> Option<u32> {
        match self {
            SampleFormat::F32 => Some(4),
            SampleFormat::S16 => Some(2),
            SampleFormat::Spdif => None,
        }
    }

    /// Whether samples are uniformly sized
    pub fn is_linear(self) -> bool {
        self.bytes_per_sample().is_some()
    }
}

/// S/PDIF AC-3 burst: 1536 samples carried in 6144 bytes
const SPDIF_FRAME_LENGTH: u32 = 1536;
const SPDIF_BYTES_PER_FRAME: u32 = 6144;

/// Audio format descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    /// Sample encoding
    pub sample_format: SampleFormat,

    /// Sample rate in Hz
    pub rate: u32,

    /// Channel count
    pub channels: u16,

    /// Size of one frame unit in bytes
    pub bytes_per_frame: u32,

    /// Samples per frame unit (1 for linear PCM)
    pub frame_length: u32,
}

impl AudioFormat {
    /// Create a validated format descriptor
    ///
    /// # Errors
    ///
    /// Returns [`MixerError::InvalidFormat`] if any field is zero.
    pub fn new(
        sample_format: SampleFormat,
        rate: u32,
        channels: u16,
        bytes_per_frame: u32,
        frame_length: u32,
    ) -> Result<Self> {
        if rate == 0 {
            return Err(MixerError::InvalidFormat("rate must be > 0".to_string()));
        }
        if channels == 0 {
            return Err(MixerError::InvalidFormat("channels must be > 0".to_string()));
        }
        if bytes_per_frame == 0 || frame_length == 0 {
            return Err(MixerError::InvalidFormat(format!(
                "frame geometry must be non-zero (bytes_per_frame={}, frame_length={})",
                bytes_per_frame, frame_length
            )));
        }

        Ok(Self {
            sample_format,
            rate,
            channels,
            bytes_per_frame,
            frame_length,
        })
    }

    /// Interleaved linear PCM format
    ///
    /// # Errors
    ///
    /// Returns [`MixerError::InvalidFormat`] for non-linear sample formats or
    /// zero rate/channels.
    pub fn linear(sample_format: SampleFormat, rate: u32, channels: u16) -> Result<Self> {
        let bytes_per_sample = sample_format.bytes_per_sample().ok_or_else(|| {
            MixerError::InvalidFormat(format!("{:?} is not a linear format", sample_format))
        })?;
        Self::new(
            sample_format,
            rate,
            channels,
            bytes_per_sample * channels as u32,
            1,
        )
    }

    /// Stereo S/PDIF passthrough format
    pub fn spdif(rate: u32) -> Result<Self> {
        Self::new(
            SampleFormat::Spdif,
            rate,
            2,
            SPDIF_BYTES_PER_FRAME,
            SPDIF_FRAME_LENGTH,
        )
    }

    /// Whether blocks must be consumed whole (no byte-offset addressing)
    pub fn is_non_linear(&self) -> bool {
        !self.sample_format.is_linear()
    }

    /// Payload size in bytes of `samples` samples
    pub fn bytes_for_samples(&self, samples: u32) -> usize {
        (samples as u64 * self.bytes_per_frame as u64 / self.frame_length as u64) as usize
    }

    /// Duration of `samples` samples in clock units
    pub fn duration_of(&self, samples: u32) -> Mtime {
        samples_to_mtime(samples as u64, self.rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_f32_stereo_geometry() {
        let fmt = AudioFormat::linear(SampleFormat::F32, 48_000, 2).unwrap();
        assert_eq!(fmt.bytes_per_frame, 8);
        assert_eq!(fmt.frame_length, 1);
        assert!(!fmt.is_non_linear());
        assert_eq!(fmt.bytes_for_samples(1024), 8192);
    }

    #[test]
    fn test_linear_s16_mono_geometry() {
        let fmt = AudioFormat::linear(SampleFormat::S16, 44_100, 1).unwrap();
        assert_eq!(fmt.bytes_per_frame, 2);
        assert_eq!(fmt.duration_of(44_100), 1_000_000);
    }

    #[test]
    fn test_spdif_is_non_linear() {
        let fmt = AudioFormat::spdif(48_000).unwrap();
        assert!(fmt.is_non_linear());
        assert_eq!(fmt.bytes_for_samples(1536), 6144);
    }

    #[test]
    fn test_linear_rejects_spdif() {
        assert!(matches!(
            AudioFormat::linear(SampleFormat::Spdif, 48_000, 2),
            Err(MixerError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_zero_fields_rejected() {
        assert!(AudioFormat::linear(SampleFormat::F32, 0, 2).is_err());
        assert!(AudioFormat::linear(SampleFormat::F32, 48_000, 0).is_err());
        assert!(AudioFormat::new(SampleFormat::F32, 48_000, 2, 0, 1).is_err());
        assert!(AudioFormat::new(SampleFormat::F32, 48_000, 2, 8, 0).is_err());
    }

    #[test]
    fn test_sample_format_deserializes_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            format: SampleFormat,
        }
        let w: Wrapper = toml::from_str("format = \"s16\"").unwrap();
        assert_eq!(w.format, SampleFormat::S16);
    }
}
