//! Frame Sources for Lane Cameras
//!
//! Provides the frames each lane counter works on:
//! - Still-image sequences on disk (one directory per lane)
//! - In-memory replay buffers for simulation and tests
//!
//! Every source behaves as a looping feed: end-of-stream is reported as
//! `Ok(None)` and the consumer rewinds.

pub mod frame;
pub mod replay;
pub mod sequence;

pub use frame::VideoFrame;
pub use replay::ReplaySource;
pub use sequence::ImageSequenceSource;

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info};

/// Frame source error types
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to open source {path}: {reason}")]
    Open { path: PathBuf, reason: String },

    #[error("Source {0} contains no frames")]
    Empty(String),

    #[error("Failed to decode frame {path}: {reason}")]
    Decode { path: PathBuf, reason: String },
}

/// A looping supplier of frames bound to one lane.
pub trait VideoSource: Send {
    /// Next frame, or `None` once the feed is exhausted.
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, SourceError>;

    /// Restart the feed from its first frame.
    fn rewind(&mut self) -> Result<(), SourceError>;

    /// Human readable identifier used in logs.
    fn name(&self) -> &str;
}

impl<T: VideoSource + ?Sized> VideoSource for Box<T> {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, SourceError> {
        (**self).next_frame()
    }

    fn rewind(&mut self) -> Result<(), SourceError> {
        (**self).rewind()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Open one image-sequence source per lane directory, in lane order.
///
/// Fails on the first lane whose directory is missing or holds no frames,
/// so the caller never starts with a partial set.
pub fn open_lane_sources<P: AsRef<Path>>(
    dirs: &[P],
) -> Result<Vec<Box<dyn VideoSource>>, SourceError> {
    let mut sources: Vec<Box<dyn VideoSource>> = Vec::with_capacity(dirs.len());
    for (idx, dir) in dirs.iter().enumerate() {
        let source = ImageSequenceSource::open(dir.as_ref())
            .inspect_err(|e| error!(lane = idx + 1, "Lane source unavailable: {}", e))?;
        sources.push(Box::new(source));
    }
    info!("Opened {} lane sources", sources.len());
    Ok(sources)
}
