//! Per-lane sensing snapshot

use chrono::{DateTime, Utc};
use serde::Serialize;
use vehicle_detection::{CategoryCounts, DetectionSummary};

/// Latest sensed state of one lane
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LaneSnapshot {
    /// Vehicles seen in the latest detection cycle
    pub vehicle_count: u32,
    /// An emergency vehicle was seen in the latest detection cycle
    pub ambulance_present: bool,
    /// Category breakdown of the latest detection cycle
    pub categories: CategoryCounts,
    /// Time of the latest detection, `None` before the first one
    pub last_updated: Option<DateTime<Utc>>,
}

impl LaneSnapshot {
    /// Overwrite with a fresh detection cycle
    pub(crate) fn apply(&mut self, summary: &DetectionSummary, at: DateTime<Utc>) {
        self.vehicle_count = summary.vehicle_count;
        self.ambulance_present = summary.ambulance_present;
        self.categories = summary.categories.clone();
        self.last_updated = Some(at);
    }
}
