//! Intersection control loop

use crate::state::{
    IntersectionState, PhaseEvent, SchedulerMode, SignalColor, SignalHandle, SignalState,
};
use crate::timing::{cascading_red_times, green_duration, next_red_time};
use crate::{SchedulerConfig, SchedulerError, TrafficSensor};
use chrono::Utc;
use lane_counter::LaneId;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 64;

/// Lowest-numbered lane reporting an ambulance
pub fn select_emergency_lane(status: &BTreeMap<LaneId, bool>) -> Option<LaneId> {
    status
        .iter()
        .find(|(_, present)| **present)
        .map(|(lane, _)| *lane)
}

/// Four-lane signal scheduler
pub struct IntersectionScheduler<S> {
    config: SchedulerConfig,
    sensor: S,
    state: SignalHandle,
    events: broadcast::Sender<PhaseEvent>,
    shutdown: watch::Receiver<bool>,
    current_lane: LaneId,
}

impl<S: TrafficSensor> IntersectionScheduler<S> {
    /// Create a scheduler; it stops once `shutdown` turns true or its sender drops
    pub fn new(
        config: SchedulerConfig,
        sensor: S,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self, SchedulerError> {
        config.validate()?;
        info!(
            yellow = config.yellow_secs,
            additional_red = config.additional_red_secs,
            "Creating intersection scheduler"
        );

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            config,
            sensor,
            state: SignalHandle::new(IntersectionState::initial()),
            events,
            shutdown,
            current_lane: LaneId::first(),
        })
    }

    pub fn handle(&self) -> SignalHandle {
        self.state.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PhaseEvent> {
        self.events.subscribe()
    }

    pub fn current_lane(&self) -> LaneId {
        self.current_lane
    }

    /// Run until shutdown
    pub async fn run(mut self) -> Result<(), SchedulerError> {
        info!(delay_secs = self.config.startup_delay_secs, "Intersection scheduler starting");

        match self.drive().await {
            Err(SchedulerError::Shutdown) => {
                info!("Intersection scheduler stopped");
                Ok(())
            }
            other => other,
        }
    }

    async fn drive(&mut self) -> Result<(), SchedulerError> {
        let delay = self.config.startup_delay();
        self.sleep(delay).await?;
        loop {
            self.step().await?;
        }
    }

    /// One loop iteration: an emergency cycle if any lane reports an
    /// ambulance, otherwise one normal phase of the current lane
    pub async fn step(&mut self) -> Result<(), SchedulerError> {
        match select_emergency_lane(&self.sensor.ambulance_status()) {
            Some(lane) => self.run_emergency(lane).await,
            None => self.run_phase().await,
        }
    }

    async fn run_phase(&mut self) -> Result<(), SchedulerError> {
        let lane = self.current_lane;
        let counts = self.sensor.vehicle_counts();
        let count = counts.get(&lane).copied().unwrap_or(0);
        let green = green_duration(count, &self.config.tiers);
        let reds = cascading_red_times(lane.next(), lane, &counts, &self.config);

        info!(lane = %lane, vehicles = count, green_secs = green, "Green phase");
        self.state.update(|s| {
            s.mode = SchedulerMode::Normal;
            s.current_lane = lane;
            s.set(lane, SignalState::green(green));
            for (waiting, wait) in &reds {
                s.set(*waiting, SignalState::red(*wait));
            }
        });
        self.emit(lane, SignalColor::Green, green, false);
        self.countdown(green).await?;

        let yellow = self.config.yellow_secs;
        self.state.update(|s| s.set(lane, SignalState::yellow(yellow)));
        self.emit(lane, SignalColor::Yellow, yellow, false);
        self.countdown(yellow).await?;

        // Timed from the counts sampled when this phase began
        let red = next_red_time(lane, &counts, &self.config);
        let next = lane.next();
        self.state.update(|s| {
            s.set(lane, SignalState::red(red));
            s.current_lane = next;
        });
        self.emit(lane, SignalColor::Red, red, false);
        self.current_lane = next;

        Ok(())
    }

    async fn run_emergency(&mut self, lane: LaneId) -> Result<(), SchedulerError> {
        let resume = self.current_lane;
        warn!(lane = %lane, resume = %resume, "Ambulance detected, preempting signals");
        metrics::counter!("signal_preemptions_total", "lane" => lane.to_string()).increment(1);

        self.state.update(|s| {
            s.mode = SchedulerMode::Emergency { lane };
            for other in LaneId::ALL {
                let state = if other == lane {
                    SignalState {
                        emergency: true,
                        ..SignalState::green(0)
                    }
                } else {
                    SignalState::red(0)
                };
                s.set(other, state);
            }
        });
        self.emit(lane, SignalColor::Green, 0, true);

        loop {
            let poll = self.config.ambulance_poll();
            self.sleep(poll).await?;
            let still_present = self
                .sensor
                .ambulance_status()
                .get(&lane)
                .copied()
                .unwrap_or(false);
            if !still_present {
                break;
            }
            debug!(lane = %lane, "Ambulance still present, holding green");
            self.state.update(|s| {
                if let Some(signal) = s.signals.get_mut(&lane) {
                    signal.timer = 0;
                }
            });
        }

        info!(lane = %lane, "Ambulance cleared");
        let yellow = self.config.yellow_secs;
        self.state.update(|s| s.set(lane, SignalState::yellow(yellow)));
        self.emit(lane, SignalColor::Yellow, yellow, false);
        self.countdown(yellow).await?;

        let counts = self.sensor.vehicle_counts();
        let reds = cascading_red_times(resume, lane, &counts, &self.config);
        self.state.update(|s| {
            s.set(lane, SignalState::red(0));
            for (waiting, wait) in &reds {
                s.set(*waiting, SignalState::red(*wait));
            }
            s.mode = SchedulerMode::Normal;
            s.current_lane = resume;
        });
        self.emit(lane, SignalColor::Red, 0, false);
        self.current_lane = resume;

        info!(resume = %resume, "Resuming normal rotation");
        Ok(())
    }

    /// Tick the displayed countdowns once per second for `secs` seconds
    async fn countdown(&mut self, secs: u32) -> Result<(), SchedulerError> {
        for _ in 0..secs {
            let tick = self.config.tick();
            self.sleep(tick).await?;
            self.state.update(IntersectionState::tick);
        }
        Ok(())
    }

    /// Sleep unless shutdown arrives first; a change back to `false` keeps sleeping
    async fn sleep(&mut self, duration: Duration) -> Result<(), SchedulerError> {
        let deadline = tokio::time::Instant::now() + duration;
        loop {
            if *self.shutdown.borrow() {
                return Err(SchedulerError::Shutdown);
            }
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => return Ok(()),
                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        return Err(SchedulerError::Shutdown);
                    }
                }
            }
        }
    }

    fn emit(&self, lane: LaneId, color: SignalColor, duration: u32, emergency: bool) {
        metrics::counter!("signal_phase_changes_total", "color" => color.as_str()).increment(1);
        // No subscribers is fine
        let _ = self.events.send(PhaseEvent {
            lane,
            color,
            duration,
            emergency,
            at: Utc::now(),
        });
    }
}
