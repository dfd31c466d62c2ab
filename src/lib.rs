// SPDX-License-Identifier: GPL-3.0-only

//! Mealcam - photograph a meal, log its nutrition
//!
//! This library provides the core of the Mealcam tool: camera access with
//! strict single-stream ownership, a one-shot photo capture state machine,
//! and a persisted meal log with daily nutrition aggregates.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Camera backend abstraction and the device session
//! - [`pipelines`]: Photo capture controller
//! - [`media`]: Image artifacts and JPEG encoding
//! - [`nutrition`]: Meal log, targets and aggregates
//! - [`classifier`]: Boundary to meal recognition
//! - [`config`]: User configuration handling
//! - [`storage`]: Data directories and saved photos
//!
//! # Example
//!
//! ```ignore
//! let session = MediaDeviceSession::new(
//!     Arc::new(VirtualBackend::default()),
//!     PhotoEncoder::default(),
//! );
//! let mut controller = CaptureController::new(session, CaptureOptions::default());
//! controller.start().await?;
//! let photo = controller.capture().await?;
//! ```

pub mod backends;
pub mod classifier;
pub mod config;
pub mod constants;
pub mod errors;
pub mod flash;
pub mod media;
pub mod nutrition;
pub mod pipelines;
pub mod storage;

// Re-export commonly used types
pub use backends::camera::{MediaDeviceSession, StreamHandle};
pub use classifier::{Classification, FixedClassifier, LogOutcome, MealClassifier};
pub use config::Config;
pub use errors::{AppError, AppResult, CaptureError, StoreError};
pub use media::{ImageArtifact, PhotoEncoder};
pub use nutrition::{MealInput, NutritionStore, Targets};
pub use pipelines::photo::{CaptureController, CaptureOptions, CaptureState};
