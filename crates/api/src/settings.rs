//! Layered controller settings

use config::{Config, ConfigError, Environment, File};
use lane_counter::CountingConfig;
use serde::{Deserialize, Serialize};
use signal_scheduler::SchedulerConfig;
use std::path::PathBuf;
use std::time::Duration;
use storage::StorageConfig;
use vehicle_detection::DetectorConfig;

/// Settings file read when no path is given
pub const DEFAULT_SETTINGS_FILE: &str = "traffic.toml";

/// Environment prefix; nested keys use `__`, e.g. `TRAFFIC__SERVER__ADDR`
pub const ENV_PREFIX: &str = "TRAFFIC";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub addr: String,
    /// Prometheus exporter port; disabled when unset
    pub metrics_port: Option<u16>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_string(),
            metrics_port: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    /// Image directories for lanes 1 to 4; blank replay feeds when empty
    pub lane_dirs: Vec<PathBuf>,
    pub replay_width: u32,
    pub replay_height: u32,
    pub replay_frames: usize,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            lane_dirs: Vec::new(),
            replay_width: 640,
            replay_height: 480,
            replay_frames: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderSettings {
    pub interval_ms: u64,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self { interval_ms: 4000 }
    }
}

impl RecorderSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }
}

/// Everything the controller binary is configured with
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub sources: SourceSettings,
    pub counting: CountingConfig,
    pub detector: DetectorConfig,
    pub scheduler: SchedulerConfig,
    pub storage: StorageConfig,
    pub recorder: RecorderSettings,
}

impl Settings {
    /// Load from `path` (or `traffic.toml` if present), then the environment.
    ///
    /// An explicit path must exist; the default file is optional.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::with_name(path).required(true),
            None => File::with_name(DEFAULT_SETTINGS_FILE).required(false),
        };

        Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
