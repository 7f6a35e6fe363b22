//! Analytics Routes

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use storage::{TrafficRecord, TrafficSummary};

use crate::{ApiError, AppState};

const MAX_LIMIT: usize = 500;

/// Query parameters for the analytics endpoint
#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    /// Maximum number of records to return
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    20
}

#[derive(Debug, Serialize)]
pub struct AnalyticsResponse {
    pub records: Vec<TrafficRecord>,
    pub summary: TrafficSummary,
    pub meta: AnalyticsMeta,
}

#[derive(Debug, Serialize)]
pub struct AnalyticsMeta {
    pub count: usize,
    pub limit: usize,
}

/// Recent records, newest first, with counts per vehicle type and action
pub async fn get_analytics(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AnalyticsQuery>,
) -> Result<Json<AnalyticsResponse>, ApiError> {
    let limit = params.limit.min(MAX_LIMIT);
    let records = state.store.recent(limit).await?;
    let summary = state.store.summary().await?;

    Ok(Json(AnalyticsResponse {
        meta: AnalyticsMeta {
            count: records.len(),
            limit,
        },
        records,
        summary,
    }))
}
