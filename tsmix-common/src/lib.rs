//! # tsmix Common Library
//!
//! Shared code for the tsmix workspace including:
//! - Clock units and exact sample-count date arithmetic
//! - Configuration file resolution and loading
//! - Common error type

pub mod config;
pub mod error;
pub mod timing;

pub use error::{Error, Result};
pub use timing::{AudioDate, Mtime, CLOCK_FREQ};
