// SPDX-License-Identifier: GPL-3.0-only

//! User configuration
//!
//! Stored as pretty-printed JSON at `$MEALCAM_CONFIG`, or
//! `<config dir>/mealcam/config.json`. A missing file means defaults.

use crate::backends::camera::types::{CameraBackendType, FacingMode, Resolution};
use crate::constants::timing::DEFAULT_READY_TIMEOUT_MS;
use crate::constants::{APP_NAME, CONFIG_ENV, DEFAULT_IDEAL_RESOLUTION, paths};
use crate::errors::{AppError, AppResult};
use crate::media::EncodingQuality;
use crate::nutrition::Targets;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Camera backend to use
    pub backend: CameraBackendType,
    /// Camera opened first
    pub preferred_facing: FacingMode,
    /// Resolution requested from the camera
    pub ideal_resolution: Resolution,
    /// JPEG quality for captured photos
    pub jpeg_quality: EncodingQuality,
    /// How long the CLI retries a capture while the camera warms up
    pub ready_timeout_ms: u64,
    /// Targets used until the user sets their own
    pub default_targets: Targets,
    /// Overrides the platform data directory
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: CameraBackendType::default(),
            // Food is photographed with the rear camera
            preferred_facing: FacingMode::Back,
            ideal_resolution: DEFAULT_IDEAL_RESOLUTION,
            jpeg_quality: EncodingQuality::High,
            ready_timeout_ms: DEFAULT_READY_TIMEOUT_MS,
            default_targets: Targets::default(),
            data_dir: None,
        }
    }
}

impl Config {
    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|dir| dir.join(APP_NAME).join(paths::CONFIG_FILE))
    }

    /// Load from the default location
    pub fn load() -> AppResult<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => {
                debug!("No config directory, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load from `path`; a missing file yields defaults
    pub fn load_from(path: &Path) -> AppResult<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(AppError::Config(format!(
                    "cannot read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let config: Config = serde_json::from_str(&contents)
            .map_err(|e| AppError::Config(format!("invalid {}: {}", path.display(), e)))?;
        config
            .default_targets
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;

        info!(path = %path.display(), "Config loaded");
        Ok(config)
    }

    /// Write to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AppError::Config(format!("cannot create {}: {}", parent.display(), e)))?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, json)
            .map_err(|e| AppError::Config(format!("cannot write {}: {}", path.display(), e)))?;
        Ok(())
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }
}
