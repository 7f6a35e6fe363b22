//! Still-image sequence source
//!
//! Reads a lane's feed from a directory of images, one file per frame, in
//! file-name order. Decoding happens lazily on each read so the source only
//! holds one frame in memory at a time.

use crate::{SourceError, VideoFrame, VideoSource};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

const FRAME_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Looping image-sequence feed for one lane
pub struct ImageSequenceSource {
    name: String,
    frames: Vec<PathBuf>,
    position: usize,
    sequence: u32,
    opened_at: Instant,
}

impl ImageSequenceSource {
    /// Index the frames in `dir`
    pub fn open(dir: &Path) -> Result<Self, SourceError> {
        let entries = std::fs::read_dir(dir).map_err(|e| SourceError::Open {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut frames: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_frame_file(path))
            .collect();
        frames.sort();

        let name = dir.display().to_string();
        if frames.is_empty() {
            return Err(SourceError::Empty(name));
        }

        info!("Opened image sequence {} ({} frames)", name, frames.len());

        Ok(Self {
            name,
            frames,
            position: 0,
            sequence: 0,
            opened_at: Instant::now(),
        })
    }

    /// Number of frames in one pass
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

fn is_frame_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
}

impl VideoSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, SourceError> {
        let Some(path) = self.frames.get(self.position) else {
            return Ok(None);
        };
        // Advance first so an undecodable file is skipped on the next read
        self.position += 1;

        let image = image::open(path).map_err(|e| SourceError::Decode {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        let sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);
        let timestamp_ns = self.opened_at.elapsed().as_nanos() as u64;

        Ok(Some(VideoFrame::from_rgb_image(
            image.to_rgb8(),
            timestamp_ns,
            sequence,
        )))
    }

    fn rewind(&mut self) -> Result<(), SourceError> {
        debug!("Rewinding {}", self.name);
        self.position = 0;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for ImageSequenceSource {
    fn drop(&mut self) {
        debug!("Released image sequence {}", self.name);
    }
}
