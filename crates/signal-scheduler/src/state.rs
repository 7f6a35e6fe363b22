//! Signal state shared between the scheduler and its readers

use chrono::{DateTime, Utc};
use lane_counter::LaneId;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalColor {
    Green,
    Yellow,
    Red,
}

impl SignalColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalColor::Green => "green",
            SignalColor::Yellow => "yellow",
            SignalColor::Red => "red",
        }
    }
}

impl std::fmt::Display for SignalColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Displayed state of one lane's signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SignalState {
    pub color: SignalColor,
    /// Seconds left in the current color
    pub timer: u32,
    /// Seconds until the lane's next green while red
    pub remaining_red: u32,
    /// Green held for an ambulance
    pub emergency: bool,
}

impl SignalState {
    pub fn green(timer: u32) -> Self {
        Self {
            color: SignalColor::Green,
            timer,
            remaining_red: 0,
            emergency: false,
        }
    }

    pub fn yellow(timer: u32) -> Self {
        Self {
            color: SignalColor::Yellow,
            timer,
            remaining_red: 0,
            emergency: false,
        }
    }

    pub fn red(wait: u32) -> Self {
        Self {
            color: SignalColor::Red,
            timer: wait,
            remaining_red: wait,
            emergency: false,
        }
    }

    /// One second of countdown
    pub(crate) fn tick(&mut self) {
        self.timer = self.timer.saturating_sub(1);
        self.remaining_red = self.remaining_red.saturating_sub(1);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum SchedulerMode {
    Normal,
    Emergency { lane: LaneId },
}

/// Whole-intersection view
#[derive(Debug, Clone, Serialize)]
pub struct IntersectionState {
    pub signals: BTreeMap<LaneId, SignalState>,
    /// Lane holding (or next due) the normal-rotation green
    pub current_lane: LaneId,
    pub mode: SchedulerMode,
}

impl IntersectionState {
    /// Lane 1 green, the others red with staggered countdowns
    pub fn initial() -> Self {
        let signals = LaneId::ALL
            .into_iter()
            .map(|lane| {
                let state = if lane == LaneId::first() {
                    SignalState::green(0)
                } else {
                    SignalState::red(30 * LaneId::first().distance_to(lane) as u32)
                };
                (lane, state)
            })
            .collect();

        Self {
            signals,
            current_lane: LaneId::first(),
            mode: SchedulerMode::Normal,
        }
    }

    pub fn signal(&self, lane: LaneId) -> Option<&SignalState> {
        self.signals.get(&lane)
    }

    pub(crate) fn set(&mut self, lane: LaneId, state: SignalState) {
        self.signals.insert(lane, state);
    }

    pub(crate) fn tick(&mut self) {
        self.signals.values_mut().for_each(SignalState::tick);
    }
}

/// Phase transition published by the scheduler
#[derive(Debug, Clone, Serialize)]
pub struct PhaseEvent {
    pub lane: LaneId,
    pub color: SignalColor,
    /// Seconds the new color is scheduled for
    pub duration: u32,
    pub emergency: bool,
    pub at: DateTime<Utc>,
}

/// Cloneable read access to the live intersection state
#[derive(Debug, Clone)]
pub struct SignalHandle {
    inner: Arc<Mutex<IntersectionState>>,
}

impl SignalHandle {
    pub(crate) fn new(state: IntersectionState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, IntersectionState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> IntersectionState {
        self.lock().clone()
    }

    pub fn signal_states(&self) -> BTreeMap<LaneId, SignalState> {
        self.lock().signals.clone()
    }

    pub fn current_lane(&self) -> LaneId {
        self.lock().current_lane
    }

    pub fn mode(&self) -> SchedulerMode {
        self.lock().mode
    }

    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut IntersectionState) -> R) -> R {
        f(&mut self.lock())
    }
}
