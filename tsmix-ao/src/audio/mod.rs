//! Core audio data types

pub mod block;
pub mod format;

pub use block::AudioBlock;
pub use format::{AudioFormat, SampleFormat};
