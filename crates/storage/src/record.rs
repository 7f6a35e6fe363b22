//! Analytics record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Controller behaviour at record time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrafficAction {
    Ambulance,
    Normal,
}

impl TrafficAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrafficAction::Ambulance => "Ambulance",
            TrafficAction::Normal => "Normal",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Ambulance" => Some(TrafficAction::Ambulance),
            "Normal" => Some(TrafficAction::Normal),
            _ => None,
        }
    }
}

/// One periodic sample of the intersection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficRecord {
    pub recorded_at: DateTime<Utc>,
    /// Wall-clock display time, `HH:MM`
    pub time: String,
    /// Latest vehicle count of lanes 1 to 4
    pub lane_counts: [u32; 4],
    pub total: u32,
    /// Display label of the most frequent category since the last reset
    pub vehicle_type: Option<String>,
    /// Cumulative count of `vehicle_type`
    pub vehicle_count: u64,
    pub action: TrafficAction,
    /// Ambulance seen on any lane
    pub priority: bool,
    pub active_lane: u8,
    pub active_color: String,
}

impl TrafficRecord {
    /// Sum of the per-lane counts
    pub fn lane_total(lane_counts: &[u32; 4]) -> u32 {
        lane_counts.iter().sum()
    }
}

/// Aggregate view over stored records
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrafficSummary {
    pub total_records: usize,
    /// Records per dominant category label
    pub by_vehicle_type: BTreeMap<String, usize>,
    /// Records per action
    pub by_action: BTreeMap<String, usize>,
}

impl TrafficSummary {
    pub fn add(&mut self, record: &TrafficRecord) {
        self.total_records += 1;
        if let Some(label) = &record.vehicle_type {
            *self.by_vehicle_type.entry(label.clone()).or_default() += 1;
        }
        *self
            .by_action
            .entry(record.action.as_str().to_string())
            .or_default() += 1;
    }
}
