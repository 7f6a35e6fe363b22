//! Periodic analytics recorder

use crate::AppState;
use chrono::{DateTime, Local, Utc};
use lane_counter::{LaneId, SensingSnapshot};
use signal_scheduler::{IntersectionState, SchedulerMode};
use std::sync::Arc;
use std::time::Duration;
use storage::{StorageError, TrafficAction, TrafficRecord};
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Lane whose signal is being served: the emergency lane while preempted,
/// otherwise the rotation's current lane
fn active_lane(intersection: &IntersectionState) -> LaneId {
    match intersection.mode {
        SchedulerMode::Emergency { lane } => lane,
        SchedulerMode::Normal => intersection.current_lane,
    }
}

/// Combine signal and sensing state into one analytics record
pub fn build_record(
    intersection: &IntersectionState,
    sensing: &SensingSnapshot,
    recorded_at: DateTime<Utc>,
) -> TrafficRecord {
    let mut lane_counts = [0u32; 4];
    for (slot, lane) in lane_counts.iter_mut().zip(LaneId::ALL) {
        *slot = sensing.vehicle_counts.get(&lane).copied().unwrap_or(0);
    }

    let priority = sensing.ambulance_status.values().any(|present| *present);
    let (vehicle_type, vehicle_count) = match sensing.category_counts.dominant() {
        Some((category, count)) => (Some(category.label().to_string()), count),
        None => (None, 0),
    };

    let lane = active_lane(intersection);
    let active_color = intersection
        .signal(lane)
        .map(|s| s.color.as_str())
        .unwrap_or("red")
        .to_string();

    TrafficRecord {
        recorded_at,
        time: recorded_at.with_timezone(&Local).format("%H:%M").to_string(),
        total: TrafficRecord::lane_total(&lane_counts),
        lane_counts,
        vehicle_type,
        vehicle_count,
        action: if priority {
            TrafficAction::Ambulance
        } else {
            TrafficAction::Normal
        },
        priority,
        active_lane: lane.get(),
        active_color,
    }
}

/// Samples the intersection every interval and persists the result
pub struct AnalyticsRecorder {
    state: Arc<AppState>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl AnalyticsRecorder {
    pub fn new(state: Arc<AppState>, interval: Duration, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            state,
            interval,
            shutdown,
        }
    }

    /// Record until shutdown; the first sample is taken one interval in
    pub async fn run(mut self) {
        info!(interval_ms = self.interval.as_millis() as u64, "Analytics recorder started");

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.record_once().await {
                        // Dropped; the next tick tries again
                        warn!("Failed to store traffic record: {}", e);
                        metrics::counter!("recorder_failures_total").increment(1);
                    }
                }
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Analytics recorder stopped");
    }

    pub async fn record_once(&self) -> Result<(), StorageError> {
        let record = build_record(
            &self.state.signals.snapshot(),
            &self.state.engine.sensing_snapshot(),
            Utc::now(),
        );
        debug!(total = record.total, action = record.action.as_str(), "Recording traffic sample");
        self.state.store.insert(record).await?;
        metrics::counter!("recorder_records_total").increment(1);
        Ok(())
    }
}
