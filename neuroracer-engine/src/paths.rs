//! Platform directories for settings and trial logs.

use std::path::PathBuf;

use crate::config::EngineConfig;

#[derive(Debug, Clone)]
pub struct AppPaths {
    settings_file: PathBuf,
    output_dir: PathBuf,
}

impl AppPaths {
    pub fn new(config: &EngineConfig) -> Self {
        let settings_file = config
            .settings_path
            .clone()
            .unwrap_or_else(Self::default_settings_file);
        let output_dir = config
            .output_dir
            .clone()
            .unwrap_or_else(Self::default_output_dir);
        Self {
            settings_file,
            output_dir,
        }
    }

    pub fn settings_file(&self) -> &PathBuf {
        &self.settings_file
    }

    pub fn output_dir(&self) -> &PathBuf {
        &self.output_dir
    }

    fn default_settings_file() -> PathBuf {
        dirs::config_dir()
            .map(|base| base.join("neuroracer"))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("settings.json")
    }

    /// The user's documents folder, or the home directory, or the working
    /// directory, in that order.
    pub fn default_output_dir() -> PathBuf {
        dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
