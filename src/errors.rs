// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the food logging core
//!
//! Each layer has its own enum; [`AppError`] folds them together for the
//! command line.

use crate::backends::camera::types::BackendError;
use crate::nutrition::types::MealId;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Result type for capture controller operations
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Result type for nutrition store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Main application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),
    #[error("Nutrition store error: {0}")]
    Store(#[from] StoreError),
    #[error("Media error: {0}")]
    Media(#[from] MediaError),
    #[error("Camera error: {0}")]
    Backend(#[from] BackendError),
    #[error("Classifier error: {0}")]
    Classifier(#[from] ClassifierError),
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
    /// Storage/filesystem errors
    #[error("Storage error: {0}")]
    Storage(String),
    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

/// Capture controller errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    /// No camera, permission denied, or the device is already held
    #[error("Camera unavailable: {0}")]
    DeviceUnavailable(String),
    /// Capture requested before the stream delivered a frame
    #[error("No frame available yet: {0}")]
    FrameUnavailable(String),
    /// The intent is not valid in the current lifecycle state
    #[error("Cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },
    /// Another intent is still in flight
    #[error("Capture controller is busy")]
    Busy,
    /// Imported bytes are not a decodable image
    #[error("Invalid image: {0}")]
    InvalidImage(String),
    /// Encoding a captured frame failed
    #[error("Media error: {0}")]
    Media(String),
    /// A blocking worker task panicked or was cancelled
    #[error("Background task failed: {0}")]
    Task(String),
}

impl From<BackendError> for CaptureError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::DeviceUnavailable(msg) => CaptureError::DeviceUnavailable(msg),
            BackendError::FrameUnavailable(msg) => CaptureError::FrameUnavailable(msg),
            // Torch failures are absorbed by toggle_flash before reaching here
            BackendError::CapabilityUnsupported(msg) => CaptureError::Media(msg),
            BackendError::Io(msg) | BackendError::Other(msg) => {
                CaptureError::DeviceUnavailable(msg)
            }
        }
    }
}

impl From<tokio::task::JoinError> for CaptureError {
    fn from(err: tokio::task::JoinError) -> Self {
        CaptureError::Task(err.to_string())
    }
}

/// Nutrition store errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// A macro field is negative or not a number
    #[error("Invalid meal: {0}")]
    InvalidMeal(String),
    /// A target is zero, negative or not a number
    #[error("Invalid targets: {0}")]
    InvalidTargets(String),
    #[error("Meal not found: {0}")]
    NotFound(MealId),
    /// Load or save through the repository failed
    #[error("Persistence failed: {0}")]
    Persistence(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Persistence(err.to_string())
    }
}

/// Image encoding and normalisation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediaError {
    #[error("Decoding failed: {0}")]
    Decode(String),
    #[error("Encoding failed: {0}")]
    Encode(String),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

impl From<MediaError> for CaptureError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::Decode(msg) | MediaError::UnsupportedFormat(msg) => {
                CaptureError::InvalidImage(msg)
            }
            MediaError::Encode(msg) => CaptureError::Media(msg),
        }
    }
}

/// Errors reported by a meal classifier
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassifierError {
    /// The image shows nothing the classifier recognises
    #[error("Nothing recognised in image")]
    Unrecognized,
    #[error("Classifier failed: {0}")]
    Failed(String),
}
