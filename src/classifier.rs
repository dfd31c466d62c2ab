// SPDX-License-Identifier: GPL-3.0-only

//! Classifier boundary
//!
//! Recognition itself lives outside this crate. A [`MealClassifier`] turns
//! an [`ImageArtifact`] into a meal description or a barcode; this module
//! only routes the result into the [`NutritionStore`].

use crate::errors::{AppResult, ClassifierError};
use crate::media::ImageArtifact;
use crate::nutrition::{ImageRef, Meal, MealInput, NutritionStore};
use std::future::Future;
use tracing::info;

/// What a classifier saw in an image
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Meal(MealInput),
    /// Product barcode, for a lookup service to resolve
    Barcode(String),
}

pub trait MealClassifier: Send + Sync {
    fn classify(
        &self,
        artifact: &ImageArtifact,
    ) -> impl Future<Output = Result<Classification, ClassifierError>> + Send;
}

/// Result of [`log_artifact`]
#[derive(Debug, Clone, PartialEq)]
pub enum LogOutcome {
    /// A meal was added with the image attached
    Logged(Meal),
    /// A barcode was recognised; nothing was logged
    Barcode(String),
}

/// Classify a capture and log the meal it shows
pub async fn log_artifact<C: MealClassifier>(
    classifier: &C,
    store: &NutritionStore,
    artifact: ImageArtifact,
) -> AppResult<LogOutcome> {
    match classifier.classify(&artifact).await? {
        Classification::Meal(input) => {
            let meal = store.add_meal(input.with_image(ImageRef::Artifact(artifact)))?;
            Ok(LogOutcome::Logged(meal))
        }
        Classification::Barcode(code) => {
            info!(%code, "Barcode recognised, nothing logged");
            Ok(LogOutcome::Barcode(code))
        }
    }
}

/// Classifier that always answers with the same description
///
/// Backs the manual "snap and describe" flow, where the user types what
/// the photo shows.
#[derive(Debug, Clone)]
pub struct FixedClassifier {
    answer: Classification,
}

impl FixedClassifier {
    pub fn meal(input: MealInput) -> Self {
        Self {
            answer: Classification::Meal(input),
        }
    }

    pub fn barcode(code: impl Into<String>) -> Self {
        Self {
            answer: Classification::Barcode(code.into()),
        }
    }
}

impl MealClassifier for FixedClassifier {
    fn classify(
        &self,
        _artifact: &ImageArtifact,
    ) -> impl Future<Output = Result<Classification, ClassifierError>> + Send {
        let answer = self.answer.clone();
        async move { Ok(answer) }
    }
}
