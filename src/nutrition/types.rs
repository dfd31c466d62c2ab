// SPDX-License-Identifier: GPL-3.0-only

//! Nutrition data model

use crate::constants::nutrition::{
    DEFAULT_CALORIES, DEFAULT_CARBS, DEFAULT_FAT, DEFAULT_PROTEIN, STATE_VERSION,
};
use crate::errors::{StoreError, StoreResult};
use crate::media::ImageArtifact;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Stable meal identifier, never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MealId(Uuid);

impl MealId {
    /// A fresh random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MealId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MealId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for MealId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// User profile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub name: Option<String>,
}

/// Daily nutrition goal
///
/// Every field is a positive, finite number of kcal or grams.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Targets {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

impl Targets {
    pub fn new(calories: f64, protein: f64, carbs: f64, fat: f64) -> StoreResult<Self> {
        let targets = Self {
            calories,
            protein,
            carbs,
            fat,
        };
        targets.validate()?;
        Ok(targets)
    }

    /// Reject zero, negative and non-finite targets
    pub fn validate(&self) -> StoreResult<()> {
        for (field, value) in self.fields() {
            if !value.is_finite() || value <= 0.0 {
                return Err(StoreError::InvalidTargets(format!(
                    "{} must be a positive number, got {}",
                    field, value
                )));
            }
        }
        Ok(())
    }

    fn fields(&self) -> [(&'static str, f64); 4] {
        [
            ("calories", self.calories),
            ("protein", self.protein),
            ("carbs", self.carbs),
            ("fat", self.fat),
        ]
    }
}

impl Default for Targets {
    fn default() -> Self {
        Self {
            calories: DEFAULT_CALORIES,
            protein: DEFAULT_PROTEIN,
            carbs: DEFAULT_CARBS,
            fat: DEFAULT_FAT,
        }
    }
}

/// Image attached to a meal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ImageRef {
    /// Payload held in memory
    Artifact(ImageArtifact),
    /// Payload stored elsewhere (file path or URL)
    Uri(String),
}

/// What a classifier or the user supplies to log a meal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealInput {
    pub name: String,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    #[serde(default)]
    pub image: Option<ImageRef>,
}

impl MealInput {
    pub fn new(name: impl Into<String>, calories: f64, protein: f64, carbs: f64, fat: f64) -> Self {
        Self {
            name: name.into(),
            calories,
            protein,
            carbs,
            fat,
            image: None,
        }
    }

    pub fn with_image(mut self, image: ImageRef) -> Self {
        self.image = Some(image);
        self
    }

    /// Macros must be finite and non-negative
    pub fn validate(&self) -> StoreResult<()> {
        let fields = [
            ("calories", self.calories),
            ("protein", self.protein),
            ("carbs", self.carbs),
            ("fat", self.fat),
        ];
        for (field, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(StoreError::InvalidMeal(format!(
                    "{} must be a non-negative number, got {}",
                    field, value
                )));
            }
        }
        Ok(())
    }
}

/// A logged meal; fixed once created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meal {
    pub id: MealId,
    pub name: String,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    /// When the meal was logged
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub image: Option<ImageRef>,
}

impl Meal {
    pub(crate) fn from_input(input: MealInput, id: MealId, time: DateTime<Utc>) -> Self {
        Self {
            id,
            name: input.name,
            calories: input.calories,
            protein: input.protein,
            carbs: input.carbs,
            fat: input.fat,
            time,
            image: input.image,
        }
    }

    pub fn macros(&self) -> DailyTotals {
        DailyTotals {
            calories: self.calories,
            protein: self.protein,
            carbs: self.carbs,
            fat: self.fat,
        }
    }
}

/// Summed macros over a set of meals
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DailyTotals {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

impl DailyTotals {
    pub fn from_meals<'a>(meals: impl IntoIterator<Item = &'a Meal>) -> Self {
        meals
            .into_iter()
            .fold(Self::default(), |acc, meal| acc + meal.macros())
    }

    /// Percentage of each target reached
    pub fn progress(&self, targets: &Targets) -> MacroProgress {
        MacroProgress {
            calories: percent_of(self.calories, targets.calories),
            protein: percent_of(self.protein, targets.protein),
            carbs: percent_of(self.carbs, targets.carbs),
            fat: percent_of(self.fat, targets.fat),
        }
    }
}

impl std::ops::Add for DailyTotals {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            calories: self.calories + rhs.calories,
            protein: self.protein + rhs.protein,
            carbs: self.carbs + rhs.carbs,
            fat: self.fat + rhs.fat,
        }
    }
}

/// Rounded percent of target per macro
///
/// `None` means the target is zero or not a number, so no percentage exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MacroProgress {
    pub calories: Option<u32>,
    pub protein: Option<u32>,
    pub carbs: Option<u32>,
    pub fat: Option<u32>,
}

/// `round(total / target * 100)`, or `None` without a usable target
pub fn percent_of(total: f64, target: f64) -> Option<u32> {
    if !target.is_finite() || target <= 0.0 || !total.is_finite() {
        return None;
    }
    Some((total.max(0.0) / target * 100.0).round() as u32)
}

/// Everything the store persists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    pub version: u32,
    #[serde(default)]
    pub profile: Profile,
    pub targets: Targets,
    /// Meal log in insertion order
    #[serde(default)]
    pub meals: Vec<Meal>,
}

impl PersistedState {
    pub fn new(targets: Targets) -> Self {
        Self {
            version: STATE_VERSION,
            profile: Profile::default(),
            targets,
            meals: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meal_id_parse() {
        let id = MealId::new();
        assert_eq!(id.to_string().parse::<MealId>().unwrap(), id);
        assert!("nonexistent-id".parse::<MealId>().is_err());
    }

    #[test]
    fn test_negative_macro_rejected() {
        let input = MealInput::new("Toast", 120.0, 4.0, -1.0, 2.0);
        assert!(matches!(input.validate(), Err(StoreError::InvalidMeal(_))));
        let input = MealInput::new("Toast", f64::NAN, 4.0, 1.0, 2.0);
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_targets_must_be_positive() {
        assert!(Targets::new(2000.0, 0.0, 250.0, 65.0).is_err());
        assert!(Targets::new(2000.0, 150.0, f64::INFINITY, 65.0).is_err());
        assert_eq!(Targets::new(2000.0, 150.0, 250.0, 65.0).unwrap(), Targets::default());
    }

    #[test]
    fn test_percent_rounds() {
        assert_eq!(percent_of(300.0, 2000.0), Some(15));
        assert_eq!(percent_of(10.0, 150.0), Some(7));
        assert_eq!(percent_of(5.0, 65.0), Some(8));
        assert_eq!(percent_of(3000.0, 2000.0), Some(150));
    }

    #[test]
    fn test_percent_without_target_is_none() {
        assert_eq!(percent_of(100.0, 0.0), None);
        assert_eq!(percent_of(100.0, f64::NAN), None);
        assert_eq!(percent_of(0.0, -5.0), None);
    }

    #[test]
    fn test_progress_from_totals() {
        let totals = DailyTotals {
            calories: 1000.0,
            protein: 75.0,
            carbs: 125.0,
            fat: 0.0,
        };
        let progress = totals.progress(&Targets::default());
        assert_eq!(
            progress,
            MacroProgress {
                calories: Some(50),
                protein: Some(50),
                carbs: Some(50),
                fat: Some(0),
            }
        );
    }
}
