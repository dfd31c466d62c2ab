// SPDX-License-Identifier: GPL-3.0-only

//! Storage locations for the meal log and saved photos

use crate::config::Config;
use crate::constants::{APP_NAME, paths};
use crate::errors::{AppError, AppResult};
use crate::media::ImageArtifact;
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::info;

/// Root of all application data
pub fn data_dir(config: &Config) -> PathBuf {
    config.data_dir.clone().unwrap_or_else(|| {
        dirs::data_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
            .join(APP_NAME)
    })
}

/// Where the CLI saves captured and imported photos
pub fn photos_dir(config: &Config) -> PathBuf {
    data_dir(config).join(paths::PHOTOS_DIR)
}

/// The meal log document
pub fn store_path(config: &Config) -> PathBuf {
    data_dir(config).join(paths::STORE_FILE)
}

/// Images owned by persisted meals
pub fn images_dir(config: &Config) -> PathBuf {
    data_dir(config).join(paths::IMAGES_DIR)
}

/// Save an artifact as `IMG_<timestamp>.jpg` in `dir`
///
/// A numeric suffix is added when a photo from the same second exists.
pub fn save_artifact(artifact: &ImageArtifact, dir: &Path) -> AppResult<PathBuf> {
    std::fs::create_dir_all(dir)
        .map_err(|e| AppError::Storage(format!("cannot create {}: {}", dir.display(), e)))?;

    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let stem = format!("{}_{}", paths::PHOTO_PREFIX, timestamp);
    let mut path = dir.join(format!("{}.{}", stem, artifact.extension()));
    let mut counter = 1;
    while path.exists() {
        path = dir.join(format!("{}_{}.{}", stem, counter, artifact.extension()));
        counter += 1;
    }

    write_artifact(artifact, &path)?;
    Ok(path)
}

/// Save an artifact at an exact path
pub fn write_artifact(artifact: &ImageArtifact, path: &Path) -> AppResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .map_err(|e| AppError::Storage(format!("cannot create {}: {}", parent.display(), e)))?;
    }
    std::fs::write(path, artifact.as_bytes())
        .map_err(|e| AppError::Storage(format!("cannot write {}: {}", path.display(), e)))?;
    info!(path = %path.display(), size = artifact.len(), "Photo saved");
    Ok(())
}
