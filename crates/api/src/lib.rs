//! Intersection Controller API Server
//!
//! Read-only REST surface over the live signal and sensing state, plus the
//! periodic analytics recorder and the pieces the controller binary wires up.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use lane_counter::CountingEngine;
use serde::Serialize;
use signal_scheduler::{SchedulerMode, SignalHandle};
use std::sync::Arc;
use storage::{StorageError, TrafficStore};
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod recorder;
mod routes;
pub mod settings;
pub mod telemetry;

pub use recorder::AnalyticsRecorder;
pub use settings::Settings;
pub use telemetry::{init_logging, init_metrics};

/// Application state shared across handlers
pub struct AppState {
    pub engine: Arc<CountingEngine>,
    pub signals: SignalHandle,
    pub store: Arc<TrafficStore>,
    pub version: String,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(engine: Arc<CountingEngine>, signals: SignalHandle, store: Arc<TrafficStore>) -> Self {
        Self {
            engine,
            signals,
            store,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
        }
    }
}

/// Handler errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        tracing::warn!("Request failed: {}", self);
        let body = serde_json::json!({ "error": self.to_string() });
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub counting_running: bool,
    pub mode: SchedulerMode,
    pub storage: String,
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/signals", get(routes::signals::get_signals))
        .route("/api/v1/snapshot", get(routes::signals::get_snapshot))
        .route("/api/v1/counts", get(routes::sensing::get_counts))
        .route("/api/v1/ambulance", get(routes::sensing::get_ambulance))
        .route("/api/v1/categories", get(routes::sensing::get_categories))
        .route("/api/v1/analytics", get(routes::analytics::get_analytics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp,
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        counting_running: state.engine.is_running(),
        mode: state.signals.mode(),
        storage: state.store.backend().to_string(),
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use lane_counter::CountingConfig;
    use signal_scheduler::{IntersectionScheduler, SchedulerConfig};
    use storage::StorageConfig;
    use tokio::sync::watch;
    use tower::ServiceExt;
    use vehicle_detection::{ClassMap, SimulatedDetector, SimulationConfig};

    /// State over an idle engine and a scheduler that is never run
    pub(crate) async fn test_state() -> Arc<AppState> {
        let detector = Arc::new(SimulatedDetector::new(
            SimulationConfig::default(),
            ClassMap::default(),
        ));
        let engine = Arc::new(CountingEngine::new(CountingConfig::default(), detector));
        let (_tx, rx) = watch::channel(false);
        let scheduler =
            IntersectionScheduler::new(SchedulerConfig::default(), engine.clone(), rx).unwrap();
        let store = TrafficStore::open(&StorageConfig::default()).await.unwrap();

        Arc::new(AppState::new(engine, scheduler.handle(), Arc::new(store)))
    }

    pub(crate) async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }
}
