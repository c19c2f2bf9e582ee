use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// How a wait entry's `between` list is turned into one `[min, max]` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitBounds {
    /// Minimum from the first `between` entry, maximum from the second.
    /// This is how existing schedules have always been read, although it
    /// mixes two declared ranges.
    #[default]
    SplitRanges,
    /// Both bounds from the first `between` entry.
    FirstRange,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub poll_interval_ms: u64,
    pub monitor_interval_ms: u64,
    pub cue_exposure_ms: u64,
    pub countdown_steps: u32,
    pub cue_endpoint: String,
    pub wait_bounds: WaitBounds,
    pub default_test_name: String,
    pub schedule_path: PathBuf,
    pub output_dir: Option<PathBuf>,
    pub settings_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            monitor_interval_ms: 2000,
            cue_exposure_ms: 1000,
            countdown_steps: 100,
            cue_endpoint: "localhost:50000".to_string(),
            wait_bounds: WaitBounds::default(),
            default_test_name: "Test".to_string(),
            schedule_path: PathBuf::from("schedule.json"),
            output_dir: None,
            settings_path: None,
        }
    }
}

impl EngineConfig {
    /// Reads a JSON config file, falling back to defaults when it is missing
    /// or malformed.
    pub fn load_or_default(path: &Path) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                warn!("Config {} not readable ({}); using defaults", path.display(), e);
                return Self::default();
            }
        };
        serde_json::from_str(&text).unwrap_or_else(|e| {
            warn!("Config {} is invalid ({}); using defaults", path.display(), e);
            Self::default()
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_interval_ms.max(1))
    }

    pub fn cue_exposure(&self) -> Duration {
        Duration::from_millis(self.cue_exposure_ms)
    }
}
