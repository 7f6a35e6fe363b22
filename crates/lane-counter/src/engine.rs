//! Counting engine: shared lane state and worker lifecycle

use crate::counter::LaneCounter;
use crate::{CountingConfig, CountingError, LaneId, LaneSnapshot, LANE_COUNT};
use chrono::Utc;
use frame_source::VideoSource;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use tracing::{debug, info, warn};
use vehicle_detection::{CategoryCounts, DetectionSummary, Detector};

/// State guarded by the engine-wide lock
#[derive(Debug, Clone, Default)]
struct SensingState {
    lanes: BTreeMap<LaneId, LaneSnapshot>,
    categories: CategoryCounts,
}

impl SensingState {
    fn new() -> Self {
        Self {
            lanes: LaneId::ALL
                .iter()
                .map(|lane| (*lane, LaneSnapshot::default()))
                .collect(),
            categories: CategoryCounts::default(),
        }
    }
}

/// Consistent copy of everything the engine senses, taken under one lock
#[derive(Debug, Clone, Serialize)]
pub struct SensingSnapshot {
    pub vehicle_counts: BTreeMap<LaneId, u32>,
    pub ambulance_status: BTreeMap<LaneId, bool>,
    pub category_counts: CategoryCounts,
}

/// State and stop flag shared between the engine and its workers
pub(crate) struct Shared {
    state: Mutex<SensingState>,
    stop: AtomicBool,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SensingState> {
        // Mutations are plain overwrites, so a poisoned state is still whole
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn should_stop(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Publish one detection cycle for `lane`
    pub(crate) fn publish(&self, lane: LaneId, summary: &DetectionSummary) {
        let mut state = self.lock();
        if let Some(snapshot) = state.lanes.get_mut(&lane) {
            snapshot.apply(summary, Utc::now());
        }
        state.categories.merge(&summary.categories);
    }

    pub(crate) fn reset_categories(&self) {
        self.lock().categories.reset();
    }
}

/// Owns the per-lane counting workers and their shared snapshot state
pub struct CountingEngine {
    config: CountingConfig,
    detector: Arc<dyn Detector>,
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl CountingEngine {
    /// Create an idle engine; every lane starts at zero
    pub fn new(config: CountingConfig, detector: Arc<dyn Detector>) -> Self {
        info!(
            "Creating counting engine (detector={}, interval={}ms)",
            detector.name(),
            config.detection_interval_ms
        );
        Self {
            config,
            detector,
            shared: Arc::new(Shared {
                state: Mutex::new(SensingState::new()),
                stop: AtomicBool::new(false),
            }),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Launch one counting worker per lane, in lane order.
    ///
    /// Exactly [`LANE_COUNT`] sources are required; nothing is started otherwise.
    pub fn start(&self, sources: Vec<Box<dyn VideoSource>>) -> Result<(), CountingError> {
        if sources.len() != LANE_COUNT {
            warn!(
                "Refusing to start: {} sources for {} lanes",
                sources.len(),
                LANE_COUNT
            );
            return Err(CountingError::SourceCount {
                expected: LANE_COUNT,
                actual: sources.len(),
            });
        }

        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        if !workers.is_empty() {
            return Err(CountingError::AlreadyRunning);
        }

        self.shared.stop.store(false, Ordering::SeqCst);
        {
            let mut state = self.shared.lock();
            for snapshot in state.lanes.values_mut() {
                *snapshot = LaneSnapshot::default();
            }
        }

        for (lane, source) in LaneId::ALL.into_iter().zip(sources) {
            let counter = LaneCounter::new(
                lane,
                source,
                Arc::clone(&self.detector),
                Arc::clone(&self.shared),
                self.config.clone(),
            );

            let spawned = std::thread::Builder::new()
                .name(format!("lane-counter-{}", lane))
                .spawn(move || counter.run());

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    drop(workers);
                    self.stop();
                    return Err(CountingError::Spawn {
                        lane,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!("Counting engine started with {} lane workers", workers.len());
        Ok(())
    }

    /// Signal every worker and wait for each to exit. Idempotent.
    pub fn stop(&self) {
        self.shared.stop.store(true, Ordering::SeqCst);

        let handles = std::mem::take(
            &mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner),
        );
        if handles.is_empty() {
            return;
        }

        for handle in &handles {
            handle.thread().unpark();
        }
        for handle in handles {
            let name = handle.thread().name().unwrap_or("lane-counter").to_string();
            if handle.join().is_err() {
                warn!("Worker {} panicked before stopping", name);
            } else {
                debug!("Worker {} joined", name);
            }
        }
        info!("Counting engine stopped");
    }

    /// Whether lane workers are running
    pub fn is_running(&self) -> bool {
        !self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    /// Vehicle count per lane; always holds all four lanes
    pub fn vehicle_counts(&self) -> BTreeMap<LaneId, u32> {
        self.shared
            .lock()
            .lanes
            .iter()
            .map(|(lane, s)| (*lane, s.vehicle_count))
            .collect()
    }

    /// Ambulance flag per lane
    pub fn ambulance_status(&self) -> BTreeMap<LaneId, bool> {
        self.shared
            .lock()
            .lanes
            .iter()
            .map(|(lane, s)| (*lane, s.ambulance_present))
            .collect()
    }

    /// Cumulative category counts since the last reset
    pub fn category_counts(&self) -> CategoryCounts {
        self.shared.lock().categories.clone()
    }

    pub fn lane_snapshot(&self, lane: LaneId) -> Option<LaneSnapshot> {
        self.shared.lock().lanes.get(&lane).cloned()
    }

    pub fn snapshots(&self) -> BTreeMap<LaneId, LaneSnapshot> {
        self.shared.lock().lanes.clone()
    }

    /// Counts, ambulance flags and categories from one point in time
    pub fn sensing_snapshot(&self) -> SensingSnapshot {
        let state = self.shared.lock();
        SensingSnapshot {
            vehicle_counts: state
                .lanes
                .iter()
                .map(|(lane, s)| (*lane, s.vehicle_count))
                .collect(),
            ambulance_status: state
                .lanes
                .iter()
                .map(|(lane, s)| (*lane, s.ambulance_present))
                .collect(),
            category_counts: state.categories.clone(),
        }
    }

    /// Zero the cumulative category counts
    pub fn reset_category_counts(&self) {
        info!("Resetting category counts");
        self.shared.reset_categories();
    }
}

impl Drop for CountingEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use frame_source::{ReplaySource, VideoFrame};
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};
    use vehicle_detection::{Detection, DetectionError, VehicleCategory};

    /// Reports `frame.width` cars, plus an ambulance on 3-pixel-wide frames
    struct WidthDetector;

    impl Detector for WidthDetector {
        fn detect(&self, frame: &VideoFrame) -> Result<Vec<Detection>, DetectionError> {
            let mut detections: Vec<Detection> = (0..frame.width)
                .map(|_| Detection {
                    class_id: 2,
                    category: Some(VehicleCategory::Car),
                    confidence: 0.9,
                    bbox: [0.0; 4],
                })
                .collect();
            if frame.width == 3 {
                detections.push(Detection {
                    class_id: 0,
                    category: Some(VehicleCategory::Emergency),
                    confidence: 0.9,
                    bbox: [0.0; 4],
                });
            }
            Ok(detections)
        }
    }

    struct FailingDetector;

    impl Detector for FailingDetector {
        fn detect(&self, _frame: &VideoFrame) -> Result<Vec<Detection>, DetectionError> {
            Err(DetectionError::Inference("model crashed".into()))
        }
    }

    /// One car per call for the first `limit` calls across all lanes, then nothing
    struct BurstDetector {
        calls: AtomicUsize,
        limit: usize,
    }

    impl Detector for BurstDetector {
        fn detect(&self, _frame: &VideoFrame) -> Result<Vec<Detection>, DetectionError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) >= self.limit {
                return Ok(Vec::new());
            }
            Ok(vec![Detection {
                class_id: 2,
                category: Some(VehicleCategory::Car),
                confidence: 0.9,
                bbox: [0.0; 4],
            }])
        }
    }

    fn fast_config() -> CountingConfig {
        CountingConfig {
            detection_interval_ms: 0,
            idle_sleep_ms: 5,
            ..Default::default()
        }
    }

    fn lane_sources(count: usize) -> Vec<Box<dyn VideoSource>> {
        (1..=count as u32)
            .map(|width| {
                Box::new(ReplaySource::blank(format!("lane-{}", width), width, 1, 3))
                    as Box<dyn VideoSource>
            })
            .collect()
    }

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn test_counts_cover_all_lanes_before_start() {
        let engine = CountingEngine::new(fast_config(), Arc::new(WidthDetector));

        let counts = engine.vehicle_counts();
        assert_eq!(counts.keys().copied().collect::<Vec<_>>(), LaneId::ALL.to_vec());
        assert!(counts.values().all(|c| *c == 0));
        assert!(engine.ambulance_status().values().all(|a| !a));
    }

    #[test]
    fn test_start_rejects_three_sources() {
        let engine = CountingEngine::new(fast_config(), Arc::new(WidthDetector));

        let result = engine.start(lane_sources(3));
        assert!(matches!(
            result,
            Err(CountingError::SourceCount { expected: 4, actual: 3 })
        ));
        assert!(!engine.is_running());
    }

    #[test]
    fn test_workers_publish_lane_snapshots() {
        let engine = CountingEngine::new(fast_config(), Arc::new(WidthDetector));
        engine.start(lane_sources(4)).unwrap();
        assert!(engine.is_running());

        assert!(wait_for(|| engine
            .snapshots()
            .values()
            .all(|s| s.last_updated.is_some())));

        let counts = engine.vehicle_counts();
        for lane in LaneId::ALL {
            // Lane 3 also sees the ambulance, which counts as a vehicle
            let expected = lane.get() as u32 + u32::from(lane.get() == 3);
            assert_eq!(counts[&lane], expected);
        }

        let ambulance = engine.ambulance_status();
        assert!(ambulance[&LaneId::new(3).unwrap()]);
        assert!(!ambulance[&LaneId::new(1).unwrap()]);

        assert!(wait_for(|| engine.category_counts().get(VehicleCategory::Emergency) > 0));
        assert!(engine.category_counts().get(VehicleCategory::Car) >= 10);

        engine.stop();
        assert!(!engine.is_running());
    }

    #[test]
    fn test_stop_is_idempotent_and_engine_restarts() {
        let engine = CountingEngine::new(fast_config(), Arc::new(WidthDetector));
        engine.stop();

        engine.start(lane_sources(4)).unwrap();
        assert!(matches!(
            engine.start(lane_sources(4)),
            Err(CountingError::AlreadyRunning)
        ));

        engine.stop();
        engine.stop();
        assert!(!engine.is_running());

        engine.start(lane_sources(4)).unwrap();
        assert!(engine.is_running());
        engine.stop();
    }

    #[test]
    fn test_detector_failure_keeps_prior_values() {
        let engine = CountingEngine::new(fast_config(), Arc::new(FailingDetector));
        engine.start(lane_sources(4)).unwrap();

        std::thread::sleep(Duration::from_millis(100));
        // Workers survive the failures and nothing is published
        assert!(engine.is_running());
        assert!(engine.snapshots().values().all(|s| s.last_updated.is_none()));
        assert!(engine.vehicle_counts().values().all(|c| *c == 0));

        engine.stop();
    }

    #[test]
    fn test_reset_category_counts() {
        let engine = CountingEngine::new(fast_config(), Arc::new(WidthDetector));
        engine.start(lane_sources(4)).unwrap();
        assert!(wait_for(|| engine.category_counts().total() > 0));
        engine.stop();

        engine.reset_category_counts();
        assert_eq!(engine.category_counts(), CategoryCounts::default());
    }

    #[test]
    fn test_workers_zero_categories_each_reset_period() {
        let config = CountingConfig {
            category_reset_ms: 300,
            ..fast_config()
        };
        let detector = BurstDetector {
            calls: AtomicUsize::new(0),
            limit: 4,
        };
        let engine = CountingEngine::new(config, Arc::new(detector));
        engine.start(lane_sources(4)).unwrap();

        assert!(wait_for(|| engine.category_counts().get(VehicleCategory::Car) == 4));
        assert!(wait_for(|| engine.category_counts().total() == 0));
        engine.stop();

        assert_eq!(engine.category_counts(), CategoryCounts::default());
    }

    #[test]
    fn test_sensing_snapshot_is_consistent() {
        let engine = CountingEngine::new(fast_config(), Arc::new(WidthDetector));
        engine.start(lane_sources(4)).unwrap();
        assert!(wait_for(|| engine
            .snapshots()
            .values()
            .all(|s| s.last_updated.is_some())));
        engine.stop();

        let snapshot = engine.sensing_snapshot();
        assert_eq!(snapshot.vehicle_counts, engine.vehicle_counts());
        assert_eq!(snapshot.ambulance_status, engine.ambulance_status());
        assert_eq!(snapshot.category_counts, engine.category_counts());
    }
}
