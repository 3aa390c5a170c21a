//! Synthetic video edge
//!
//! Default source and renderer for machines without a camera or display
//! attached. The pattern scrolls so consecutive frames differ and encoded
//! sizes stay realistic.

use crate::error::VideoError;
use crate::media::traits::{VideoRenderer, VideoSource};
use crate::media::types::VideoFrame;

/// Moving-gradient frame generator.
pub struct TestPatternSource {
    width: u32,
    height: u32,
    frame_index: u64,
}

impl TestPatternSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frame_index: 0,
        }
    }
}

impl VideoSource for TestPatternSource {
    fn grab(&mut self) -> Result<VideoFrame, VideoError> {
        let mut frame = VideoFrame::black(self.width, self.height);
        let shift = (self.frame_index as u32).wrapping_mul(4);
        let data = frame.data_mut();
        let mut i = 0;
        for y in 0..self.height {
            for x in 0..self.width {
                data[i] = (x.wrapping_add(shift) & 0xff) as u8;
                data[i + 1] = (y & 0xff) as u8;
                data[i + 2] = ((x.wrapping_add(shift) ^ y) & 0xff) as u8;
                i += 3;
            }
        }
        self.frame_index += 1;
        Ok(frame)
    }
}

/// Renderer that counts frames and traces progress.
#[derive(Default)]
pub struct CountingRenderer {
    frames: u64,
}

impl CountingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }
}

impl VideoRenderer for CountingRenderer {
    fn render(&mut self, frame: &VideoFrame) -> Result<(), VideoError> {
        self.frames += 1;
        if self.frames % 120 == 0 {
            tracing::debug!(
                "Rendered {} frames ({}x{})",
                self.frames,
                frame.width(),
                frame.height()
            );
        }
        Ok(())
    }
}
