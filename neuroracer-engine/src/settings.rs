use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::EngineResult;

/// Device and button choice remembered between sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub selected_device: Option<String>,
    pub selected_button_index: usize,
}

#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or unreadable settings fall back to defaults.
    pub fn load(&self) -> AppSettings {
        if !self.path.exists() {
            debug!("No settings at {}; using defaults", self.path.display());
            return AppSettings::default();
        }
        match self.try_load() {
            Ok(settings) => {
                info!(
                    "Settings loaded. Selected button: {}",
                    settings.selected_button_index
                );
                settings
            }
            Err(e) => {
                warn!("Failed to load settings {}: {}", self.path.display(), e);
                AppSettings::default()
            }
        }
    }

    fn try_load(&self) -> EngineResult<AppSettings> {
        let text = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self, settings: &AppSettings) {
        match self.try_save(settings) {
            Ok(()) => debug!("Settings saved to {}", self.path.display()),
            Err(e) => warn!("Failed to save settings {}: {}", self.path.display(), e),
        }
    }

    fn try_save(&self, settings: &AppSettings) -> EngineResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(settings)?)?;
        Ok(())
    }
}
