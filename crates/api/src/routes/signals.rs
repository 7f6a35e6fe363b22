//! Signal Routes

use axum::{extract::State, Json};
use lane_counter::{LaneId, LaneSnapshot, SensingSnapshot};
use serde::Serialize;
use signal_scheduler::IntersectionState;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::AppState;

/// Everything the dashboard needs in one read
#[derive(Debug, Serialize)]
pub struct SnapshotResponse {
    pub intersection: IntersectionState,
    pub sensing: SensingSnapshot,
    pub lanes: BTreeMap<LaneId, LaneSnapshot>,
}

/// Current signal of every lane
pub async fn get_signals(State(state): State<Arc<AppState>>) -> Json<IntersectionState> {
    Json(state.signals.snapshot())
}

pub async fn get_snapshot(State(state): State<Arc<AppState>>) -> Json<SnapshotResponse> {
    Json(SnapshotResponse {
        intersection: state.signals.snapshot(),
        sensing: state.engine.sensing_snapshot(),
        lanes: state.engine.snapshots(),
    })
}
