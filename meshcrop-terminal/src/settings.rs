//! User settings for the terminal cropper

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const SETTINGS_FILE: &str = "settings.json";
const LOG_FILE: &str = "meshcrop.log";

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "meshcrop", "meshcrop")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// World units moved per key press in translate mode
    pub translate_step: f32,
    /// World units added to the box size per key press in scale mode
    pub scale_step: f32,
    /// Where artifacts are written
    pub output_dir: PathBuf,
    pub frame_rate: u32,
    /// Log destination while the editor owns the terminal
    pub log_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            translate_step: 0.1,
            scale_step: 0.1,
            output_dir: PathBuf::from("."),
            frame_rate: 30,
            log_file: None,
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join(SETTINGS_FILE))
    }

    /// Load from the platform config dir, or defaults when there is no file
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse settings in {}", path.display()))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write settings to {}", path.display()))
    }

    /// Configured log file, else one in the platform data dir, else the temp dir
    pub fn log_path(&self) -> PathBuf {
        if let Some(path) = &self.log_file {
            return path.clone();
        }
        project_dirs()
            .map(|dirs| dirs.data_local_dir().join(LOG_FILE))
            .unwrap_or_else(|| std::env::temp_dir().join(LOG_FILE))
    }

    pub fn frame_time(&self) -> std::time::Duration {
        std::time::Duration::from_millis(1000 / u64::from(self.frame_rate.max(1)))
    }
}
