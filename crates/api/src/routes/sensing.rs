//! Sensing Routes

use axum::{extract::State, Json};
use lane_counter::LaneId;
use std::collections::BTreeMap;
use std::sync::Arc;
use vehicle_detection::CategoryCounts;

use crate::AppState;

/// Latest vehicle count per lane
pub async fn get_counts(State(state): State<Arc<AppState>>) -> Json<BTreeMap<LaneId, u32>> {
    Json(state.engine.vehicle_counts())
}

/// Latest ambulance flag per lane
pub async fn get_ambulance(State(state): State<Arc<AppState>>) -> Json<BTreeMap<LaneId, bool>> {
    Json(state.engine.ambulance_status())
}

/// Cumulative per-category counts since the last reset
pub async fn get_categories(State(state): State<Arc<AppState>>) -> Json<CategoryCounts> {
    Json(state.engine.category_counts())
}
