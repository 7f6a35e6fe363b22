//! Intersection Signal Scheduler
//!
//! Drives the four-lane signal rotation:
//! - Adaptive green time from the live vehicle count of each lane
//! - Cascading red countdowns for waiting lanes
//! - Emergency preemption when an ambulance is sensed, resuming the
//!   rotation at the interrupted lane afterwards

mod config;
mod scheduler;
mod state;
mod timing;

pub use config::{GreenTiers, SchedulerConfig};
pub use scheduler::{select_emergency_lane, IntersectionScheduler};
pub use state::{
    IntersectionState, PhaseEvent, SchedulerMode, SignalColor, SignalHandle, SignalState,
};
pub use timing::{cascading_red_times, green_duration, next_red_time};

use lane_counter::{CountingEngine, LaneId};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Scheduler errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Invalid scheduler configuration: {0}")]
    Config(String),

    /// Shutdown was requested while the loop was waiting
    #[error("Scheduler shut down")]
    Shutdown,
}

/// Live sensing the scheduler decides from
pub trait TrafficSensor: Send + Sync {
    fn vehicle_counts(&self) -> BTreeMap<LaneId, u32>;

    fn ambulance_status(&self) -> BTreeMap<LaneId, bool>;
}

impl TrafficSensor for CountingEngine {
    fn vehicle_counts(&self) -> BTreeMap<LaneId, u32> {
        CountingEngine::vehicle_counts(self)
    }

    fn ambulance_status(&self) -> BTreeMap<LaneId, bool> {
        CountingEngine::ambulance_status(self)
    }
}

impl<T: TrafficSensor + ?Sized> TrafficSensor for Arc<T> {
    fn vehicle_counts(&self) -> BTreeMap<LaneId, u32> {
        (**self).vehicle_counts()
    }

    fn ambulance_status(&self) -> BTreeMap<LaneId, bool> {
        (**self).ambulance_status()
    }
}
