//! Per-lane counting worker

use crate::engine::Shared;
use crate::{CountingConfig, LaneId};
use frame_source::{VideoFrame, VideoSource};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use vehicle_detection::{DetectionSummary, Detector};

/// Decides when the next detection may run
#[derive(Debug)]
pub(crate) struct DetectionThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl DetectionThrottle {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// True when no detection ran yet or the interval has elapsed
    pub(crate) fn is_due(&self, now: Instant) -> bool {
        self.last
            .map_or(true, |last| now.saturating_duration_since(last) >= self.interval)
    }

    pub(crate) fn mark(&mut self, now: Instant) {
        self.last = Some(now);
    }
}

/// Fires once per elapsed period of worker lifetime
#[derive(Debug)]
pub(crate) struct ResetClock {
    period: Duration,
    since: Instant,
}

impl ResetClock {
    pub(crate) fn new(period: Duration, start: Instant) -> Self {
        Self {
            period,
            since: start,
        }
    }

    pub(crate) fn is_due(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.since) >= self.period {
            self.since = now;
            true
        } else {
            false
        }
    }
}

/// Worker bound to one lane and its source
pub(crate) struct LaneCounter {
    lane: LaneId,
    source: Box<dyn VideoSource>,
    detector: Arc<dyn Detector>,
    shared: Arc<Shared>,
    config: CountingConfig,
}

impl LaneCounter {
    pub(crate) fn new(
        lane: LaneId,
        source: Box<dyn VideoSource>,
        detector: Arc<dyn Detector>,
        shared: Arc<Shared>,
        config: CountingConfig,
    ) -> Self {
        Self {
            lane,
            source,
            detector,
            shared,
            config,
        }
    }

    /// Worker loop; returns once the engine raises its stop flag
    pub(crate) fn run(mut self) {
        info!(lane = %self.lane, source = self.source.name(), "Lane counter started");

        let mut throttle = DetectionThrottle::new(self.config.detection_interval());
        let mut reset_clock =
            ResetClock::new(self.config.category_reset_interval(), Instant::now());
        let mut just_rewound = false;

        while !self.shared.should_stop() {
            if reset_clock.is_due(Instant::now()) {
                info!(lane = %self.lane, "Hourly category count reset");
                self.shared.reset_categories();
            }

            let frame = match self.source.next_frame() {
                Ok(Some(frame)) => {
                    just_rewound = false;
                    frame
                }
                Ok(None) => {
                    debug!(lane = %self.lane, "Source exhausted, rewinding");
                    if let Err(e) = self.source.rewind() {
                        warn!(lane = %self.lane, "Rewind failed: {}", e);
                    }
                    // Retry at once, but never spin on a feed that is empty after rewinding
                    if just_rewound {
                        self.idle();
                    }
                    just_rewound = true;
                    continue;
                }
                Err(e) => {
                    warn!(lane = %self.lane, "Frame read failed: {}", e);
                    self.idle();
                    continue;
                }
            };

            let now = Instant::now();
            if throttle.is_due(now) {
                self.detect(&frame);
                throttle.mark(now);
            }

            self.idle();
        }

        info!(lane = %self.lane, "Lane counter stopped");
    }

    fn detect(&self, frame: &VideoFrame) {
        let lane = self.lane.to_string();
        match self.detector.detect(frame) {
            Ok(detections) => {
                let summary = DetectionSummary::from_detections(&detections);
                debug!(
                    lane = %self.lane,
                    vehicles = summary.vehicle_count,
                    ambulance = summary.ambulance_present,
                    "Detection cycle"
                );
                self.shared.publish(self.lane, &summary);

                metrics::counter!("lane_detections_total", "lane" => lane.clone()).increment(1);
                metrics::gauge!("lane_vehicle_count", "lane" => lane)
                    .set(summary.vehicle_count as f64);
            }
            Err(e) => {
                // Prior snapshot stays in place for this cycle
                warn!(lane = %self.lane, "Detection failed: {}", e);
                metrics::counter!("lane_detector_failures_total", "lane" => lane).increment(1);
            }
        }
    }

    fn idle(&self) {
        // Unparked by the engine on stop
        std::thread::park_timeout(self.config.idle_sleep());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttle_first_detection_is_immediate() {
        let throttle = DetectionThrottle::new(Duration::from_secs(3));
        assert!(throttle.is_due(Instant::now()));
    }

    #[test]
    fn test_throttle_waits_for_interval() {
        let start = Instant::now();
        let mut throttle = DetectionThrottle::new(Duration::from_secs(3));
        throttle.mark(start);

        assert!(!throttle.is_due(start + Duration::from_millis(2999)));
        assert!(throttle.is_due(start + Duration::from_secs(3)));
    }

    #[test]
    fn test_reset_clock_fires_after_an_hour() {
        let start = Instant::now();
        let hour = Duration::from_secs(3600);
        let mut clock = ResetClock::new(hour, start);

        assert!(!clock.is_due(start + Duration::from_secs(3599)));
        assert!(clock.is_due(start + hour));
        // Restarts from the reset point
        assert!(!clock.is_due(start + hour + Duration::from_secs(1)));
        assert!(clock.is_due(start + hour * 2));
    }
}
