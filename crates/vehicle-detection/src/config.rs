//! Detector configuration

use crate::{ClassMap, VehicleCategory};
use serde::{Deserialize, Serialize};

/// One class-id to category binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassMapping {
    pub class_id: u32,
    pub category: VehicleCategory,
}

/// Settings for the simulated backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Upper bound on vehicles reported per frame
    pub max_vehicles: u32,

    /// Report an ambulance on frames whose sequence number is a multiple of n (disabled when absent)
    pub ambulance_every: Option<u64>,

    /// Seed for the deterministic generator
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_vehicles: 25,
            ambulance_every: None,
            seed: 0x5EED,
        }
    }
}

/// Detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// ONNX model path; the simulated backend is used when absent
    pub model_path: Option<String>,

    /// Minimum class score kept
    pub confidence_threshold: f32,

    /// IoU above which overlapping boxes of one class are merged
    pub nms_iou_threshold: f32,

    /// Square model input size in pixels
    pub input_size: u32,

    /// Class id bindings; the built-in map is used when empty
    pub class_map: Vec<ClassMapping>,

    pub simulation: SimulationConfig,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            confidence_threshold: 0.25,
            nms_iou_threshold: 0.45,
            input_size: 640,
            class_map: Vec::new(),
            simulation: SimulationConfig::default(),
        }
    }
}

impl DetectorConfig {
    /// Resolved class map
    pub fn class_map(&self) -> ClassMap {
        if self.class_map.is_empty() {
            ClassMap::default()
        } else {
            ClassMap::new(self.class_map.iter().map(|m| (m.class_id, m.category)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_uses_builtin_class_map() {
        let config = DetectorConfig::default();
        assert_eq!(config.class_map(), ClassMap::default());
    }

    #[test]
    fn test_custom_class_map() {
        let config = DetectorConfig {
            class_map: vec![
                ClassMapping { class_id: 0, category: VehicleCategory::Emergency },
                ClassMapping { class_id: 1, category: VehicleCategory::Car },
            ],
            ..Default::default()
        };
        let map = config.class_map();
        assert_eq!(map.category(1), Some(VehicleCategory::Car));
        assert_eq!(map.category(2), None);
    }
}
