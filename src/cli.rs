// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Listing available cameras
//! - Taking or importing a meal photo
//! - Reading and editing the meal log, targets and profile

use chrono::Local;
use clap::Args;
use mealcam::backends::camera::types::FacingMode;
use mealcam::backends::camera::{MediaDeviceSession, get_backend_for_type};
use mealcam::classifier::{FixedClassifier, LogOutcome, log_artifact};
use mealcam::config::Config;
use mealcam::constants::file_formats::is_image_path;
use mealcam::constants::timing::CAPTURE_RETRY_INTERVAL;
use mealcam::errors::{AppError, AppResult, CaptureError, CaptureResult};
use mealcam::media::{ImageArtifact, PhotoEncoder};
use mealcam::nutrition::{
    ImageRef, JsonFileRepository, Meal, MealId, MealInput, NutritionStore, Profile, SystemClock,
    Targets,
};
use mealcam::pipelines::photo::{CaptureController, CaptureOptions, FlashToggle};
use mealcam::storage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Nutrition facts given on the command line
#[derive(Args, Debug, Clone, Default)]
pub struct MealArgs {
    /// Meal name; logs the photo as a meal when given
    #[arg(long)]
    pub name: Option<String>,

    /// Energy in kcal
    #[arg(long, default_value_t = 0.0)]
    pub calories: f64,

    /// Protein in grams
    #[arg(long, default_value_t = 0.0)]
    pub protein: f64,

    /// Carbohydrates in grams
    #[arg(long, default_value_t = 0.0)]
    pub carbs: f64,

    /// Fat in grams
    #[arg(long, default_value_t = 0.0)]
    pub fat: f64,
}

impl MealArgs {
    fn into_input(self) -> Option<MealInput> {
        let name = self.name?;
        Some(MealInput::new(
            name,
            self.calories,
            self.protein,
            self.carbs,
            self.fat,
        ))
    }
}

/// New daily targets; omitted fields keep their value
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Energy in kcal
    #[arg(long)]
    pub calories: Option<f64>,

    /// Protein in grams
    #[arg(long)]
    pub protein: Option<f64>,

    /// Carbohydrates in grams
    #[arg(long)]
    pub carbs: Option<f64>,

    /// Fat in grams
    #[arg(long)]
    pub fat: Option<f64>,
}

impl TargetArgs {
    fn is_empty(&self) -> bool {
        self.calories.is_none() && self.protein.is_none() && self.carbs.is_none() && self.fat.is_none()
    }
}

fn open_session(config: &Config) -> MediaDeviceSession {
    MediaDeviceSession::new(
        get_backend_for_type(config.backend),
        PhotoEncoder::new(config.jpeg_quality),
    )
}

fn open_store(config: &Config) -> AppResult<NutritionStore> {
    let repo = JsonFileRepository::new(storage::store_path(config))
        .with_images_dir(storage::images_dir(config));
    let store = NutritionStore::open(Arc::new(repo), Arc::new(SystemClock), config.default_targets)?;
    Ok(store)
}

/// List all available cameras
pub fn list_cameras(config: &Config) -> AppResult<()> {
    let session = open_session(config);
    let cameras = session.cameras();

    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras ({}):", config.backend);
    println!();
    for (index, camera) in cameras.iter().enumerate() {
        let facing = camera
            .facing
            .map(|f| f.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let torch = if session.has_torch(camera) { "yes" } else { "no" };
        println!("  [{}] {}", index, camera.name);
        println!("      Path: {}", camera.path);
        println!("      Facing: {}, torch: {}", facing, torch);

        let mut resolutions: Vec<_> = session
            .formats(camera)
            .iter()
            .map(|f| f.resolution())
            .collect();
        resolutions.sort_by_key(|r| std::cmp::Reverse(r.area()));
        resolutions.dedup();
        if !resolutions.is_empty() {
            let top: Vec<String> = resolutions.iter().take(5).map(|r| r.to_string()).collect();
            println!("      Resolutions: {}", top.join(", "));
        }
        println!();
    }

    Ok(())
}

/// Start the camera, then retry until a frame is ready or `timeout` passes
async fn take_photo(
    controller: &mut CaptureController,
    flash: bool,
    timeout: Duration,
) -> CaptureResult<ImageArtifact> {
    controller.start().await?;

    if flash && controller.toggle_flash().await? == FlashToggle::NoEffect {
        eprintln!("This camera has no flash, continuing without it.");
    }

    let deadline = Instant::now() + timeout;
    loop {
        match controller.capture().await {
            Err(CaptureError::FrameUnavailable(reason)) if Instant::now() < deadline => {
                debug!(%reason, "Camera not ready, retrying");
                tokio::time::sleep(CAPTURE_RETRY_INTERVAL).await;
            }
            result => return result,
        }
    }
}

/// Take a photo and save it, logging a meal when one is described
pub async fn snap(
    config: &Config,
    facing: Option<FacingMode>,
    flash: bool,
    output: Option<PathBuf>,
    meal: MealArgs,
) -> AppResult<()> {
    let options = CaptureOptions {
        facing: facing.unwrap_or(config.preferred_facing),
        ideal_resolution: config.ideal_resolution,
    };
    let mut controller = CaptureController::new(open_session(config), options);

    println!("Starting {} camera...", options.facing);
    let outcome = tokio::select! {
        result = take_photo(&mut controller, flash, config.ready_timeout()) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    let artifact = match outcome {
        Some(Ok(artifact)) => artifact,
        Some(Err(e)) => {
            controller.close().await;
            return Err(e.into());
        }
        None => {
            controller.close().await;
            println!("Cancelled.");
            return Ok(());
        }
    };

    println!("Captured {}x{} photo.", artifact.width(), artifact.height());
    finish(config, artifact, output, meal).await
}

/// Import an image file in place of a capture
pub async fn import(
    config: &Config,
    file: &Path,
    output: Option<PathBuf>,
    meal: MealArgs,
) -> AppResult<()> {
    if !is_image_path(file) {
        // The content decides; the extension only hints
        warn!(path = %file.display(), "Unknown image extension, trying anyway");
    }
    let bytes = tokio::fs::read(file)
        .await
        .map_err(|e| AppError::Storage(format!("cannot read {}: {}", file.display(), e)))?;

    let mut controller = CaptureController::new(open_session(config), CaptureOptions::default());
    let artifact = controller.import_from_file(bytes).await?;

    println!("Imported {}x{} photo.", artifact.width(), artifact.height());
    finish(config, artifact, output, meal).await
}

/// Save the photo and log the meal, if any
///
/// A logged meal keeps its own copy of the image, so the photo is only
/// written to the photos directory when no meal was given or an explicit
/// output path was.
async fn finish(
    config: &Config,
    artifact: ImageArtifact,
    output: Option<PathBuf>,
    meal: MealArgs,
) -> AppResult<()> {
    if let Some(path) = &output {
        storage::write_artifact(&artifact, path)?;
        println!("Photo saved to: {}", path.display());
    }

    let Some(input) = meal.into_input() else {
        if output.is_none() {
            let path = storage::save_artifact(&artifact, &storage::photos_dir(config))?;
            println!("Photo saved to: {}", path.display());
        }
        return Ok(());
    };

    let store = open_store(config)?;
    match log_artifact(&FixedClassifier::meal(input), &store, artifact).await? {
        LogOutcome::Logged(meal) => {
            println!("Logged {}", format_meal(&meal));
        }
        LogOutcome::Barcode(code) => {
            println!("Barcode {} recognised, nothing logged.", code);
        }
    }
    store.close()?;
    Ok(())
}

/// Log a meal typed on the command line
pub async fn add_meal(config: &Config, meal: MealArgs, image: Option<PathBuf>) -> AppResult<()> {
    let mut input = meal
        .into_input()
        .ok_or_else(|| AppError::Other("--name is required".to_string()))?;

    if let Some(path) = image {
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| AppError::Storage(format!("cannot read {}: {}", path.display(), e)))?;
        let encoder = PhotoEncoder::new(config.jpeg_quality);
        let artifact = tokio::task::spawn_blocking(move || encoder.normalize(&bytes))
            .await
            .map_err(|e| AppError::Other(e.to_string()))??;
        input = input.with_image(ImageRef::Artifact(artifact));
    }

    let store = open_store(config)?;
    let meal = store.add_meal(input)?;
    info!(id = %meal.id, "Meal added from command line");
    println!("Logged {}", format_meal(&meal));
    store.close()?;
    Ok(())
}

/// Remove a meal by id
pub fn delete_meal(config: &Config, id: &str) -> AppResult<()> {
    let id: MealId = id
        .parse()
        .map_err(|e| AppError::Other(format!("invalid meal id '{}': {}", id, e)))?;

    let store = open_store(config)?;
    let meal = store.delete_meal(id)?;
    println!("Deleted {}", format_meal(&meal));
    store.close()?;
    Ok(())
}

/// Print today's meals, totals and progress
pub fn show_today(config: &Config) -> AppResult<()> {
    let store = open_store(config)?;
    let meals = store.todays_meals();
    let totals = store.todays_totals();
    let progress = store.todays_progress();
    let targets = store.targets();

    match store.profile().name {
        Some(name) => println!("Today for {}:", name),
        None => println!("Today:"),
    }
    println!();

    if meals.is_empty() {
        println!("  No meals logged yet.");
    }
    for meal in &meals {
        println!("  {}", format_meal(meal));
    }
    println!();

    let rows = [
        ("Calories", totals.calories, targets.calories, progress.calories, "kcal"),
        ("Protein", totals.protein, targets.protein, progress.protein, "g"),
        ("Carbs", totals.carbs, targets.carbs, progress.carbs, "g"),
        ("Fat", totals.fat, targets.fat, progress.fat, "g"),
    ];
    for (label, total, target, percent, unit) in rows {
        let percent = percent
            .map(|p| format!("{}%", p))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<9}{:>8.0} / {:<6.0}{:<5}{:>6}",
            label, total, target, unit, percent
        );
    }

    Ok(())
}

/// Show the targets, or update the fields that were given
pub fn targets(config: &Config, args: TargetArgs) -> AppResult<()> {
    let store = open_store(config)?;

    if !args.is_empty() {
        let current = store.targets();
        let updated = Targets::new(
            args.calories.unwrap_or(current.calories),
            args.protein.unwrap_or(current.protein),
            args.carbs.unwrap_or(current.carbs),
            args.fat.unwrap_or(current.fat),
        )?;
        store.update_targets(updated)?;
        println!("Targets updated.");
    }

    let targets = store.targets();
    println!("Calories: {:.0} kcal", targets.calories);
    println!("Protein:  {:.0} g", targets.protein);
    println!("Carbs:    {:.0} g", targets.carbs);
    println!("Fat:      {:.0} g", targets.fat);
    store.close()?;
    Ok(())
}

/// Show the profile, or set its name
pub fn profile(config: &Config, name: Option<String>) -> AppResult<()> {
    let store = open_store(config)?;

    if let Some(name) = name {
        store.update_profile(Profile { name: Some(name) })?;
        println!("Profile updated.");
    }

    match store.profile().name {
        Some(name) => println!("Name: {}", name),
        None => println!("Name: (not set)"),
    }
    store.close()?;
    Ok(())
}

fn format_meal(meal: &Meal) -> String {
    let photo = if meal.image.is_some() { " [photo]" } else { "" };
    format!(
        "{}  {}  {} - {:.0} kcal, P {:.0}g, C {:.0}g, F {:.0}g{}",
        meal.id,
        meal.time.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
        meal.name,
        meal.calories,
        meal.protein,
        meal.carbs,
        meal.fat,
        photo
    )
}
