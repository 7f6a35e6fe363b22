//! Adaptive Intersection Controller - Main Entry Point

use anyhow::{Context, Result};
use api::settings::SourceSettings;
use api::{create_router, init_logging, init_metrics, AnalyticsRecorder, AppState, Settings};
use frame_source::{open_lane_sources, ReplaySource, VideoSource};
use lane_counter::{CountingEngine, LaneId};
use signal_scheduler::IntersectionScheduler;
use std::sync::Arc;
use storage::TrafficStore;
use tokio::sync::watch;
use tracing::{error, info};
use vehicle_detection::{Detector, DetectorConfig, SimulatedDetector};

#[cfg(feature = "onnx")]
fn model_detector(config: &DetectorConfig) -> Result<Option<Arc<dyn Detector>>> {
    if config.model_path.is_none() {
        return Ok(None);
    }
    let detector =
        vehicle_detection::OnnxDetector::new(config).context("Failed to load detection model")?;
    Ok(Some(Arc::new(detector)))
}

#[cfg(not(feature = "onnx"))]
fn model_detector(config: &DetectorConfig) -> Result<Option<Arc<dyn Detector>>> {
    if let Some(path) = &config.model_path {
        tracing::warn!(model = %path, "Built without the onnx feature, ignoring model");
    }
    Ok(None)
}

fn build_detector(config: &DetectorConfig) -> Result<Arc<dyn Detector>> {
    if let Some(detector) = model_detector(config)? {
        info!(detector = detector.name(), "Using model detector");
        return Ok(detector);
    }

    info!("Using simulated detector");
    Ok(Arc::new(SimulatedDetector::new(
        config.simulation.clone(),
        config.class_map(),
    )))
}

fn open_sources(settings: &SourceSettings) -> Result<Vec<Box<dyn VideoSource>>> {
    if settings.lane_dirs.is_empty() {
        info!("No lane directories configured, replaying blank frames");
        return Ok(LaneId::ALL
            .iter()
            .map(|lane| {
                Box::new(ReplaySource::blank(
                    format!("replay-lane-{lane}"),
                    settings.replay_width,
                    settings.replay_height,
                    settings.replay_frames,
                )) as Box<dyn VideoSource>
            })
            .collect());
    }

    open_lane_sources(&settings.lane_dirs).context("Failed to open lane sources")
}

async fn wait_for_ctrl_c(shutdown: watch::Sender<bool>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for ctrl-c: {}", e);
    }
    info!("Shutdown requested");
    let _ = shutdown.send(true);
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1);
    let settings = Settings::load(config_path.as_deref()).context("Failed to load settings")?;

    init_logging(&settings.logging)?;
    if let Some(port) = settings.server.metrics_port {
        init_metrics(port)?;
    }

    info!("=== Traffic Controller v{} ===", env!("CARGO_PKG_VERSION"));

    let detector = build_detector(&settings.detector)?;
    let sources = open_sources(&settings.sources)?;

    let engine = Arc::new(CountingEngine::new(settings.counting.clone(), detector));
    engine.start(sources)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = IntersectionScheduler::new(
        settings.scheduler.clone(),
        engine.clone(),
        shutdown_rx.clone(),
    )?;

    let store = Arc::new(
        TrafficStore::open(&settings.storage)
            .await
            .context("Failed to open traffic store")?,
    );
    let state = Arc::new(AppState::new(engine.clone(), scheduler.handle(), store.clone()));

    let scheduler_task = tokio::spawn(scheduler.run());
    let recorder = AnalyticsRecorder::new(
        state.clone(),
        settings.recorder.interval(),
        shutdown_rx,
    );
    let recorder_task = tokio::spawn(recorder.run());

    let listener = tokio::net::TcpListener::bind(&settings.server.addr)
        .await
        .with_context(|| format!("Failed to bind {}", settings.server.addr))?;
    info!("Starting API server on {}", settings.server.addr);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(wait_for_ctrl_c(shutdown_tx))
        .await?;

    scheduler_task.await??;
    recorder_task.await?;
    store.close().await;

    // Joining the lane workers blocks
    tokio::task::spawn_blocking(move || engine.stop()).await?;

    info!("Traffic controller stopped");
    Ok(())
}
