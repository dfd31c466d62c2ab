// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use mealcam::Config;
use mealcam::backends::camera::types::{CameraBackendType, FacingMode, Resolution};
use mealcam::errors::AppError;
use mealcam::media::EncodingQuality;
use mealcam::nutrition::Targets;
use std::time::Duration;

#[test]
fn test_config_default() {
    let config = Config::default();

    // Food is photographed with the rear camera
    assert_eq!(config.preferred_facing, FacingMode::Back);
    assert_eq!(config.backend, CameraBackendType::V4l2);
    assert_eq!(config.jpeg_quality, EncodingQuality::High);
    assert_eq!(config.default_targets, Targets::default());
    assert_eq!(config.ready_timeout(), Duration::from_secs(5));
    assert!(config.data_dir.is_none());
}

#[test]
fn test_missing_file_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load_from(&dir.path().join("config.json")).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");
    let config = Config {
        backend: CameraBackendType::Virtual,
        preferred_facing: FacingMode::Front,
        ideal_resolution: Resolution::new(1280, 720),
        jpeg_quality: EncodingQuality::Medium,
        ready_timeout_ms: 1500,
        default_targets: Targets::new(1800.0, 120.0, 200.0, 60.0).unwrap(),
        data_dir: Some(dir.path().join("data")),
    };

    config.save_to(&path).unwrap();
    assert_eq!(Config::load_from(&path).unwrap(), config);
}

#[test]
fn test_partial_file_fills_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{ "backend": "virtual", "jpeg_quality": "low" }"#).unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.backend, CameraBackendType::Virtual);
    assert_eq!(config.jpeg_quality, EncodingQuality::Low);
    assert_eq!(config.preferred_facing, FacingMode::Back);
}

#[test]
fn test_invalid_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "backend = virtual").unwrap();

    assert!(matches!(Config::load_from(&path), Err(AppError::Config(_))));
}

#[test]
fn test_zero_default_target_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{ "default_targets": { "calories": 0, "protein": 100, "carbs": 200, "fat": 50 } }"#,
    )
    .unwrap();

    assert!(matches!(Config::load_from(&path), Err(AppError::Config(_))));
}
