//! Vehicle Detection
//!
//! Turns lane frames into classified detections:
//! - Category mapping from model class ids (car, truck, motorcycle, bus, emergency)
//! - Per-cycle tallies consumed by the lane counters
//! - A deterministic simulated backend for runs without a model
//! - An ONNX backend for YOLO-style models (feature `onnx`)

pub mod category;
pub mod config;
pub mod simulated;
#[cfg(feature = "onnx")]
pub mod onnx;

pub use category::{CategoryCounts, ClassMap, VehicleCategory};
pub use config::{ClassMapping, DetectorConfig, SimulationConfig};
pub use simulated::SimulatedDetector;
#[cfg(feature = "onnx")]
pub use onnx::OnnxDetector;

use frame_source::VideoFrame;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Detection error types
#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),
}

/// One object found in a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Raw model class id
    pub class_id: u32,
    /// Mapped vehicle category, `None` for classes the intersection ignores
    pub category: Option<VehicleCategory>,
    /// Detection confidence
    pub confidence: f32,
    /// Bounding box [x, y, width, height] in frame pixels
    pub bbox: [f32; 4],
}

/// Frame classifier shared by all lane counters.
pub trait Detector: Send + Sync {
    fn detect(&self, frame: &VideoFrame) -> Result<Vec<Detection>, DetectionError>;

    fn name(&self) -> &str {
        "detector"
    }
}

impl<T: Detector + ?Sized> Detector for std::sync::Arc<T> {
    fn detect(&self, frame: &VideoFrame) -> Result<Vec<Detection>, DetectionError> {
        (**self).detect(frame)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// What a lane counter needs out of one detection cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectionSummary {
    /// Detections with a recognized vehicle category
    pub vehicle_count: u32,
    /// Any detection in the emergency category
    pub ambulance_present: bool,
    /// Per-category tally for this cycle
    pub categories: CategoryCounts,
}

impl DetectionSummary {
    pub fn from_detections(detections: &[Detection]) -> Self {
        let mut summary = Self::default();
        for category in detections.iter().filter_map(|d| d.category) {
            summary.vehicle_count += 1;
            summary.categories.add(category, 1);
            if category == VehicleCategory::Emergency {
                summary.ambulance_present = true;
            }
        }
        summary
    }
}
