//! Simulated detector
//!
//! Stands in for a real model during development and demos. Output is a pure
//! function of the seed and the frame sequence number, so any frame can be
//! replayed exactly no matter which thread asks or in what order.

use crate::{ClassMap, Detection, DetectionError, Detector, SimulationConfig, VehicleCategory};
use frame_source::VideoFrame;
use tracing::{debug, info};

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

/// splitmix64 stream
struct SplitMix(u64);

impl SplitMix {
    fn for_frame(seed: u64, sequence: u32) -> Self {
        let mut mix = SplitMix(seed ^ (sequence as u64).wrapping_mul(GOLDEN_GAMMA));
        // Decorrelate neighbouring sequence numbers
        mix.next();
        mix
    }

    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(GOLDEN_GAMMA);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }
}

/// Deterministic pseudo-detector
pub struct SimulatedDetector {
    config: SimulationConfig,
    class_map: ClassMap,
}

impl SimulatedDetector {
    pub fn new(config: SimulationConfig, class_map: ClassMap) -> Self {
        info!(
            "Creating simulated detector (max_vehicles={}, ambulance_every={:?})",
            config.max_vehicles, config.ambulance_every
        );
        Self { config, class_map }
    }

    fn synthetic(
        &self,
        rng: &mut SplitMix,
        class_id: u32,
        frame: &VideoFrame,
        slot: u32,
    ) -> Detection {
        let width = frame.width.max(1) as f32;
        let height = frame.height.max(1) as f32;
        Detection {
            class_id,
            category: self.class_map.category(class_id),
            confidence: 0.5 + (rng.next() % 50) as f32 / 100.0,
            bbox: [
                (slot as f32 * 37.0) % width,
                height * 0.5,
                width * 0.1,
                height * 0.1,
            ],
        }
    }
}

impl Detector for SimulatedDetector {
    fn detect(&self, frame: &VideoFrame) -> Result<Vec<Detection>, DetectionError> {
        let mut rng = SplitMix::for_frame(self.config.seed, frame.sequence);
        let vehicles = (rng.next() % (self.config.max_vehicles as u64 + 1)) as u32;

        let road_classes: Vec<u32> = [
            VehicleCategory::Car,
            VehicleCategory::Truck,
            VehicleCategory::Motorcycle,
            VehicleCategory::Bus,
        ]
        .iter()
        .filter_map(|c| self.class_map.class_id(*c))
        .collect();

        let mut detections = Vec::with_capacity(vehicles as usize + 1);
        if !road_classes.is_empty() {
            for slot in 0..vehicles {
                // Cars dominate real traffic: half of all draws
                let roll = rng.next();
                let class_id = if roll % 2 == 0 {
                    road_classes[0]
                } else {
                    road_classes[(roll as usize / 2) % road_classes.len()]
                };
                detections.push(self.synthetic(&mut rng, class_id, frame, slot));
            }
        }

        let ambulance_due = self
            .config
            .ambulance_every
            .map_or(false, |every| every > 0 && frame.sequence as u64 % every == 0);
        if ambulance_due {
            if let Some(class_id) = self.class_map.class_id(VehicleCategory::Emergency) {
                detections.push(self.synthetic(&mut rng, class_id, frame, vehicles));
            }
        }

        debug!(
            "Simulated {} detections for frame {}",
            detections.len(),
            frame.sequence
        );
        Ok(detections)
    }

    fn name(&self) -> &str {
        "simulated"
    }
}
