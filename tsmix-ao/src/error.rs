//! Error types for tsmix-ao
//!
//! Per-cycle conditions (no data, gaps, late output) are not errors: they are
//! reported through [`crate::mixer::CycleOutcome`]. Only construction,
//! configuration and task failures surface here.

use crate::audio::SampleFormat;
use thiserror::Error;

/// Main error type for tsmix-ao
#[derive(Error, Debug)]
pub enum MixerError {
    /// No built-in mix function supports the output format
    #[error("No suitable audio mixer for {format:?} output")]
    NoSuitableMixer { format: SampleFormat },

    /// Output format parameters are unusable
    #[error("Invalid audio format: {0}")]
    InvalidFormat(String),

    /// Configuration loading or validation errors
    #[error(transparent)]
    Config(#[from] tsmix_common::Error),

    /// Background mixer task failed to complete
    #[error("Mixer task error: {0}")]
    Task(String),
}

/// Convenience Result type using tsmix-ao MixerError
pub type Result<T> = std::result::Result<T, MixerError>;
