// SPDX-License-Identifier: GPL-3.0-only

//! Load/save contract for the nutrition store
//!
//! The store only knows [`MealRepository`]. Two implementations ship:
//! [`MemoryRepository`] for tests and embedding, and [`JsonFileRepository`]
//! which keeps the state in one JSON document with meal images stored next
//! to it.

use super::types::{ImageRef, MealId, PersistedState};
use crate::constants::paths::IMAGES_DIR;
use crate::errors::{StoreError, StoreResult};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Persistence contract
pub trait MealRepository: Send + Sync {
    /// Previously saved state, or `None` on first run
    fn load(&self) -> StoreResult<Option<PersistedState>>;

    /// Replace the saved state
    fn save(&self, state: &PersistedState) -> StoreResult<()>;
}

/// In-process repository
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: Mutex<Option<PersistedState>>,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository that already holds `state`
    pub fn with_state(state: PersistedState) -> Self {
        Self {
            state: Mutex::new(Some(state)),
            ..Self::default()
        }
    }

    /// Make every save fail, as a full disk would
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// What was last saved
    pub fn stored(&self) -> Option<PersistedState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl MealRepository for MemoryRepository {
    fn load(&self) -> StoreResult<Option<PersistedState>> {
        Ok(self.stored())
    }

    fn save(&self, state: &PersistedState) -> StoreResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Persistence("save rejected".to_string()));
        }
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = Some(state.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// JSON document on disk
///
/// In-memory image artifacts are written to `images/<meal-id>.<ext>` and
/// referenced by path in the document. Image files whose meal is gone are
/// deleted on the next save.
#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    path: PathBuf,
    images_dir: PathBuf,
}

impl JsonFileRepository {
    /// Store at `path`, images in an `images` directory next to it
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let images_dir = path
            .parent()
            .map(|parent| parent.join(IMAGES_DIR))
            .unwrap_or_else(|| PathBuf::from(IMAGES_DIR));
        Self { path, images_dir }
    }

    pub fn with_images_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.images_dir = dir.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    /// Copy of `state` with every artifact replaced by its file path
    fn externalize_images(&self, state: &PersistedState) -> StoreResult<PersistedState> {
        let mut on_disk = state.clone();
        for meal in &mut on_disk.meals {
            let Some(ImageRef::Artifact(artifact)) = &meal.image else {
                continue;
            };
            std::fs::create_dir_all(&self.images_dir)?;
            let file = self
                .images_dir
                .join(format!("{}.{}", meal.id, artifact.extension()));
            if !file.exists() {
                write_atomic(&file, artifact.as_bytes())?;
                debug!(meal_id = %meal.id, path = %file.display(), "Meal image stored");
            }
            meal.image = Some(ImageRef::Uri(file.to_string_lossy().to_string()));
        }
        Ok(on_disk)
    }

    /// Delete image files that no longer belong to a meal
    ///
    /// Leftover `<id>.<ext>.tmp` files from an interrupted write go too:
    /// every image of the saved state is in place by now.
    fn collect_garbage(&self, state: &PersistedState) {
        let Ok(entries) = std::fs::read_dir(&self.images_dir) else {
            return;
        };
        let live: HashSet<MealId> = state.meals.iter().map(|meal| meal.id).collect();

        for entry in entries.flatten() {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            let (name, partial) = match name.strip_suffix(".tmp") {
                Some(name) => (name, true),
                None => (name, false),
            };
            let Some(id) = name
                .split('.')
                .next()
                .and_then(|stem| stem.parse::<MealId>().ok())
            else {
                continue;
            };
            if !partial && live.contains(&id) {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) if partial => info!(meal_id = %id, "Removed partial image write"),
                Ok(()) => info!(meal_id = %id, "Removed image of deleted meal"),
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove stale image"),
            }
        }
    }
}

impl MealRepository for JsonFileRepository {
    fn load(&self) -> StoreResult<Option<PersistedState>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No saved meals yet");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let state: PersistedState = serde_json::from_str(&contents)?;
        info!(
            path = %self.path.display(),
            meals = state.meals.len(),
            "Loaded nutrition state"
        );
        Ok(Some(state))
    }

    fn save(&self, state: &PersistedState) -> StoreResult<()> {
        let on_disk = self.externalize_images(state)?;
        let json = serde_json::to_string_pretty(&on_disk)?;
        write_atomic(&self.path, json.as_bytes())?;
        self.collect_garbage(&on_disk);
        debug!(path = %self.path.display(), meals = on_disk.meals.len(), "Saved nutrition state");
        Ok(())
    }
}

/// Write via a sibling temp file and rename, so readers never see a torn file
fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nutrition::types::{Meal, MealInput, Targets};
    use chrono::Utc;

    #[test]
    fn test_memory_repository_fail_switch() {
        let repo = MemoryRepository::new();
        let state = PersistedState::new(Targets::default());
        repo.save(&state).unwrap();
        repo.set_fail_saves(true);
        assert!(matches!(repo.save(&state), Err(StoreError::Persistence(_))));
        assert_eq!(repo.save_count(), 1);
    }

    #[test]
    fn test_json_missing_file_is_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonFileRepository::new(dir.path().join("meals.json"));
        assert_eq!(repo.load().unwrap(), None);
    }

    #[test]
    fn test_json_uri_image_kept() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonFileRepository::new(dir.path().join("meals.json"));
        let mut state = PersistedState::new(Targets::default());
        state.meals.push(Meal::from_input(
            MealInput::new("Soup", 200.0, 8.0, 20.0, 6.0)
                .with_image(ImageRef::Uri("https://example.org/soup.jpg".into())),
            MealId::new(),
            Utc::now(),
        ));

        repo.save(&state).unwrap();
        assert_eq!(repo.load().unwrap(), Some(state));
        assert!(!dir.path().join("meals.json.tmp").exists());
    }

    #[test]
    fn test_json_corrupt_file_is_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meals.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            JsonFileRepository::new(path).load(),
            Err(StoreError::Persistence(_))
        ));
    }

    #[test]
    fn test_json_save_removes_partial_image_writes() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonFileRepository::new(dir.path().join("meals.json"));
        let images = repo.images_dir().to_path_buf();
        std::fs::create_dir_all(&images).unwrap();

        let live = MealId::new();
        let gone = MealId::new();
        std::fs::write(images.join(format!("{}.jpg", live)), b"jpeg").unwrap();
        std::fs::write(images.join(format!("{}.jpg.tmp", live)), b"jp").unwrap();
        std::fs::write(images.join(format!("{}.jpg.tmp", gone)), b"j").unwrap();
        std::fs::write(images.join("notes.txt"), b"keep").unwrap();

        let mut state = PersistedState::new(Targets::default());
        state.meals.push(Meal::from_input(
            MealInput::new("Toast", 180.0, 6.0, 30.0, 3.0).with_image(ImageRef::Uri(
                images.join(format!("{}.jpg", live)).to_string_lossy().to_string(),
            )),
            live,
            Utc::now(),
        ));
        repo.save(&state).unwrap();

        assert!(images.join(format!("{}.jpg", live)).exists());
        assert!(!images.join(format!("{}.jpg.tmp", live)).exists());
        assert!(!images.join(format!("{}.jpg.tmp", gone)).exists());
        assert!(images.join("notes.txt").exists());
    }
}
