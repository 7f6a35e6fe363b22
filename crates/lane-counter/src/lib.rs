//! Lane Counting Engine
//!
//! Runs one counting worker per intersection approach. Each worker pulls
//! frames from its lane's source, throttles detection to a fixed interval,
//! and publishes the latest lane snapshot into state shared by the signal
//! scheduler and the read-only API.

mod config;
mod counter;
mod engine;
mod lane;
mod snapshot;

pub use config::CountingConfig;
pub use engine::{CountingEngine, SensingSnapshot};
pub use lane::{InvalidLane, LaneId, LANE_COUNT};
pub use snapshot::LaneSnapshot;

use thiserror::Error;

/// Counting engine errors
#[derive(Debug, Error)]
pub enum CountingError {
    /// Wrong number of lane sources at start
    #[error("Configuration error: expected {expected} video sources, got {actual}")]
    SourceCount { expected: usize, actual: usize },

    /// `start` called on a running engine
    #[error("Configuration error: counting engine is already running")]
    AlreadyRunning,

    /// Worker thread could not be spawned
    #[error("Failed to spawn counter for lane {lane}: {reason}")]
    Spawn { lane: LaneId, reason: String },
}
