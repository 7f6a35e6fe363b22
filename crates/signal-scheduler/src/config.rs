//! Scheduler configuration

use crate::SchedulerError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Vehicle-count tiers for green time
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GreenTiers {
    /// Counts at or above this get `medium_secs`
    pub medium_threshold: u32,
    /// Counts at or above this get `long_secs`
    pub long_threshold: u32,
    pub short_secs: u32,
    pub medium_secs: u32,
    pub long_secs: u32,
}

impl Default for GreenTiers {
    fn default() -> Self {
        Self {
            medium_threshold: 10,
            long_threshold: 20,
            short_secs: 10,
            medium_secs: 20,
            long_secs: 30,
        }
    }
}

/// Configuration for the intersection scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Yellow phase length (seconds)
    pub yellow_secs: u32,
    /// Extra clearance added to every red wait except the next lane's (seconds)
    pub additional_red_secs: u32,
    /// Wait before the first green (seconds)
    pub startup_delay_secs: u64,
    /// Length of one countdown tick (ms); one tick is one displayed second
    pub tick_ms: u64,
    /// Interval between ambulance-clear checks during preemption (ms)
    pub ambulance_poll_ms: u64,
    pub tiers: GreenTiers,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            yellow_secs: 3,
            additional_red_secs: 0,
            startup_delay_secs: 0,
            tick_ms: 1000,
            ambulance_poll_ms: 1000,
            tiers: GreenTiers::default(),
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.tiers.medium_threshold > self.tiers.long_threshold {
            return Err(SchedulerError::Config(format!(
                "medium threshold {} exceeds long threshold {}",
                self.tiers.medium_threshold, self.tiers.long_threshold
            )));
        }
        if self.tick_ms == 0 || self.ambulance_poll_ms == 0 {
            return Err(SchedulerError::Config(
                "tick and ambulance poll intervals must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn ambulance_poll(&self) -> Duration {
        Duration::from_millis(self.ambulance_poll_ms)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_secs(self.startup_delay_secs)
    }
}
