//! Synthetic noise source for development and load testing.

use anyhow::Result;
use rand::RngCore;

use super::{FrameSource, SourceStats};
use crate::{now_s, Frame};

pub struct SyntheticSource {
    width: u32,
    height: u32,
    seq: u64,
    stats: SourceStats,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            seq: 0,
            stats: SourceStats::default(),
        }
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<Frame> {
        let mut data = vec![0u8; (self.width * self.height * 3) as usize];
        rand::thread_rng().fill_bytes(&mut data);
        let frame = Frame::new(data, self.width, self.height, self.seq, now_s()?);
        self.seq += 1;
        self.stats.frames_captured += 1;
        Ok(frame)
    }

    fn reconfigure(&mut self) -> Result<()> {
        self.stats.reconnects += 1;
        Ok(())
    }

    fn stats(&self) -> SourceStats {
        self.stats.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_carry_monotonic_sequence_numbers() {
        let mut source = SyntheticSource::new(8, 8);
        let a = source.next_frame().unwrap();
        let b = source.next_frame().unwrap();
        assert_eq!(a.seq, 0);
        assert_eq!(b.seq, 1);
        assert_eq!(a.data.len(), 8 * 8 * 3);
        assert_eq!(source.stats().frames_captured, 2);
    }
}
