//! tsmix-ao configuration
//!
//! Loaded from a TOML file located by [`ConfigResolver`]; every field has a
//! built-in default so an empty or missing file is valid.
//!
//! ```toml
//! [output]
//! sample_format = "f32"   # f32 | s16 | spdif
//! rate = 48000
//! channels = 2
//! period_samples = 1024
//!
//! [mixer]
//! continuity_tolerance_us = 1
//! late_tolerance_us = 0
//! tick_interval_ms = 5
//! volume = 1.0
//!
//! [simulation]
//! duration_ms = 2000
//! block_samples = 960
//! lead_ms = 200
//! gap_every = 0
//! gap_us = 5000
//! tone_hz = 440.0
//!
//! [logging]
//! level = "info"
//! ```

use crate::audio::{AudioFormat, SampleFormat};
use crate::error::Result;
use crate::mixer::MixerSettings;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tsmix_common::config::{load_toml, ConfigResolver, LoggingConfig};
use tsmix_common::timing::Mtime;
use tsmix_common::Error;

/// Application name used for config file lookup (`TSMIX_CONFIG`, `~/.config/tsmix/`)
pub const APP_NAME: &str = "tsmix";

const MIN_RATE: u32 = 8_000;
const MAX_RATE: u32 = 192_000;
const MAX_CHANNELS: u16 = 8;

/// Output stream parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputSection {
    pub sample_format: SampleFormat,

    /// Sample rate in Hz
    pub rate: u32,

    pub channels: u16,

    /// Samples produced per mixer cycle
    pub period_samples: u32,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            sample_format: SampleFormat::F32,
            rate: 48_000,
            channels: 2,
            period_samples: 1024,
        }
    }
}

/// Mixer timing parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MixerSection {
    /// Largest timestamp mismatch between adjacent input blocks treated as contiguous
    pub continuity_tolerance_us: Mtime,

    /// How far the output clock may fall behind real time before it is reset
    pub late_tolerance_us: Mtime,

    /// Mixer service tick
    pub tick_interval_ms: u64,

    /// Master volume (0.0-1.0)
    pub volume: f32,
}

impl Default for MixerSection {
    fn default() -> Self {
        Self {
            continuity_tolerance_us: 1,
            late_tolerance_us: 0,
            tick_interval_ms: 5,
            volume: 1.0,
        }
    }
}

/// Synthetic decoder and device parameters for `tsmix-sim`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimulationSection {
    /// Length of generated audio
    pub duration_ms: u64,

    /// Samples per decoded input block (ignored for S/PDIF)
    pub block_samples: u32,

    /// How far ahead of real time the decoder runs
    pub lead_ms: u64,

    /// Inject a timestamp discontinuity every N blocks (0 = never)
    pub gap_every: u32,

    /// Size of each injected discontinuity; negative values produce overlaps
    pub gap_us: Mtime,

    /// Test tone frequency
    pub tone_hz: f32,
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            duration_ms: 2_000,
            block_samples: 960,
            lead_ms: 200,
            gap_every: 0,
            gap_us: 5_000,
            tone_hz: 440.0,
        }
    }
}

/// Complete tsmix-ao configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AoConfig {
    pub output: OutputSection,
    pub mixer: MixerSection,
    pub simulation: SimulationSection,
    pub logging: LoggingConfig,
}

/// Command-line configuration overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub rate: Option<u32>,
    pub period_samples: Option<u32>,
    pub volume: Option<f32>,
    pub duration_ms: Option<u64>,
    pub log_level: Option<String>,
}

impl AoConfig {
    /// Resolve, load, override and validate the configuration
    ///
    /// # Configuration Priority
    ///
    /// 1. Command-line overrides
    /// 2. TOML file (`cli_path`, `TSMIX_CONFIG`, user dir, `/etc`)
    /// 3. Built-in defaults
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit path is missing, the file cannot be
    /// read or parsed, or a value is out of range.
    pub fn load(cli_path: Option<&Path>, overrides: ConfigOverrides) -> Result<Self> {
        let path = ConfigResolver::new(APP_NAME).resolve(cli_path)?;
        let mut config: AoConfig = load_toml(path.as_deref())?;
        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides on top of file values
    pub fn apply(&mut self, overrides: ConfigOverrides) {
        if let Some(rate) = overrides.rate {
            self.output.rate = rate;
        }
        if let Some(period) = overrides.period_samples {
            self.output.period_samples = period;
        }
        if let Some(volume) = overrides.volume {
            self.mixer.volume = volume;
        }
        if let Some(duration) = overrides.duration_ms {
            self.simulation.duration_ms = duration;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }

    /// Check every value is in range
    pub fn validate(&self) -> Result<()> {
        let output = &self.output;
        if !(MIN_RATE..=MAX_RATE).contains(&output.rate) {
            return Err(invalid(format!(
                "output.rate must be {}-{} Hz, got {}",
                MIN_RATE, MAX_RATE, output.rate
            )));
        }
        if output.channels == 0 || output.channels > MAX_CHANNELS {
            return Err(invalid(format!(
                "output.channels must be 1-{}, got {}",
                MAX_CHANNELS, output.channels
            )));
        }
        if output.period_samples == 0 {
            return Err(invalid("output.period_samples must be > 0".to_string()));
        }

        let format = self.format()?;
        if format.is_non_linear() && output.period_samples != format.frame_length {
            return Err(invalid(format!(
                "output.period_samples must equal the {:?} frame length ({}), got {}",
                output.sample_format, format.frame_length, output.period_samples
            )));
        }

        let mixer = &self.mixer;
        if mixer.continuity_tolerance_us < 0 || mixer.late_tolerance_us < 0 {
            return Err(invalid("mixer tolerances must be >= 0".to_string()));
        }
        if !(0.0..=1.0).contains(&mixer.volume) {
            return Err(invalid(format!(
                "mixer.volume must be 0.0-1.0, got {}",
                mixer.volume
            )));
        }
        if mixer.tick_interval_ms == 0 {
            return Err(invalid("mixer.tick_interval_ms must be > 0".to_string()));
        }

        if self.simulation.block_samples == 0 {
            return Err(invalid("simulation.block_samples must be > 0".to_string()));
        }

        Ok(())
    }

    /// Output format described by the `[output]` section
    pub fn format(&self) -> Result<AudioFormat> {
        let output = &self.output;
        match output.sample_format {
            SampleFormat::Spdif => AudioFormat::spdif(output.rate),
            linear => AudioFormat::linear(linear, output.rate, output.channels),
        }
    }

    /// Mixer timing derived from `[output]` and `[mixer]`
    pub fn mixer_settings(&self) -> MixerSettings {
        MixerSettings {
            period_samples: self.output.period_samples,
            continuity_tolerance: self.mixer.continuity_tolerance_us,
            late_tolerance: self.mixer.late_tolerance_us,
        }
    }
}

fn invalid(message: String) -> crate::error::MixerError {
    Error::Config(message).into()
}
