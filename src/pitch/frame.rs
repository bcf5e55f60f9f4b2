use std::sync::Arc;

use crate::error::{Result, TonicaError};

/// A captured window of mono samples at a known sample rate.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioFrame {
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl AudioFrame {
    pub fn new(samples: impl Into<Arc<[f32]>>, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Rolling window over the most recent `size` samples of a capture stream.
///
/// Capture callbacks may deliver blocks of any length; the buffer keeps only
/// the tail. `frame()` returns `None` until the window has been filled once.
pub struct FrameBuffer {
    ring: Vec<f32>,
    write_pos: usize,
    filled: usize,
    sample_rate: u32,
}

impl FrameBuffer {
    pub fn new(size: usize, sample_rate: u32) -> Result<Self> {
        if size == 0 {
            return Err(TonicaError::invalid("frame size must be positive"));
        }
        if sample_rate == 0 {
            return Err(TonicaError::invalid("sample rate must be positive"));
        }
        Ok(Self {
            ring: vec![0.0; size],
            write_pos: 0,
            filled: 0,
            sample_rate,
        })
    }

    pub fn size(&self) -> usize {
        self.ring.len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn push(&mut self, block: &[f32]) {
        let size = self.ring.len();
        // Only the last `size` samples of an oversized block can survive.
        let block = &block[block.len().saturating_sub(size)..];
        for &s in block {
            self.ring[self.write_pos] = s;
            self.write_pos = (self.write_pos + 1) % size;
        }
        self.filled = (self.filled + block.len()).min(size);
    }

    pub fn is_ready(&self) -> bool {
        self.filled == self.ring.len()
    }

    pub fn frame(&self) -> Option<AudioFrame> {
        if !self.is_ready() {
            return None;
        }
        let mut ordered = Vec::with_capacity(self.ring.len());
        ordered.extend_from_slice(&self.ring[self.write_pos..]);
        ordered.extend_from_slice(&self.ring[..self.write_pos]);
        Some(AudioFrame::new(ordered, self.sample_rate))
    }

    pub fn reset(&mut self) {
        self.ring.iter_mut().for_each(|s| *s = 0.0);
        self.write_pos = 0;
        self.filled = 0;
    }
}
