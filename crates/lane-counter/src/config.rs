//! Counting engine configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Counting engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CountingConfig {
    /// Minimum wall-clock gap between two detections on one lane (ms)
    pub detection_interval_ms: u64,

    /// Sleep between worker cycles (ms)
    pub idle_sleep_ms: u64,

    /// Cumulative category counts are zeroed after this much worker lifetime (ms)
    pub category_reset_ms: u64,
}

impl Default for CountingConfig {
    fn default() -> Self {
        Self {
            detection_interval_ms: 3000,
            idle_sleep_ms: 100,
            category_reset_ms: 3_600_000, // 1 hour
        }
    }
}

impl CountingConfig {
    pub fn detection_interval(&self) -> Duration {
        Duration::from_millis(self.detection_interval_ms)
    }

    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms)
    }

    pub fn category_reset_interval(&self) -> Duration {
        Duration::from_millis(self.category_reset_ms)
    }
}
