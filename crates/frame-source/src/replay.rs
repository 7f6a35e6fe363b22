//! In-memory replay source

use crate::{SourceError, VideoFrame, VideoSource};

/// Replays a fixed list of frames, looping on rewind.
pub struct ReplaySource {
    name: String,
    frames: Vec<VideoFrame>,
    position: usize,
    sequence: u32,
}

impl ReplaySource {
    pub fn new(name: impl Into<String>, frames: Vec<VideoFrame>) -> Self {
        Self {
            name: name.into(),
            frames,
            position: 0,
            sequence: 0,
        }
    }

    /// `len` blank frames, used when no camera feed is configured
    pub fn blank(name: impl Into<String>, width: u32, height: u32, len: usize) -> Self {
        let frames = (0..len)
            .map(|i| VideoFrame::blank(width, height, i as u32))
            .collect();
        Self::new(name, frames)
    }

    /// Number of frames in one pass
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl VideoSource for ReplaySource {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, SourceError> {
        let Some(frame) = self.frames.get(self.position) else {
            return Ok(None);
        };
        let mut frame = frame.clone();
        frame.sequence = self.sequence;
        self.position += 1;
        self.sequence = self.sequence.wrapping_add(1);
        Ok(Some(frame))
    }

    fn rewind(&mut self) -> Result<(), SourceError> {
        self.position = 0;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
