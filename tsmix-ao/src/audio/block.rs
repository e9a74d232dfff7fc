//! Timestamped audio block
//!
//! One chunk of audio payload with its presentation timestamp and duration.
//! Decoders queue these on the mixer input; mix functions return them as
//! finished output buffers.

use tsmix_common::timing::Mtime;

/// Timestamped chunk of audio payload
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBlock {
    /// Raw sample payload in the stream's format
    pub data: Vec<u8>,

    /// Number of samples (per channel) carried by `data`
    pub nb_samples: u32,

    /// Presentation timestamp
    pub pts: Mtime,

    /// Duration in clock units
    pub length: Mtime,
}

impl AudioBlock {
    /// Create a block from payload and timing
    pub fn new(data: Vec<u8>, nb_samples: u32, pts: Mtime, length: Mtime) -> Self {
        Self {
            data,
            nb_samples,
            pts,
            length,
        }
    }

    /// Timestamp one past the last sample (`pts + length`)
    pub fn end(&self) -> Mtime {
        self.pts + self.length
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_is_pts_plus_length() {
        let block = AudioBlock::new(vec![0; 16], 4, 1_000, 250);
        assert_eq!(block.end(), 1_250);
        assert_eq!(block.len(), 16);
        assert!(!block.is_empty());
    }
}
