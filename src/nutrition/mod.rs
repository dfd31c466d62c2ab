// SPDX-License-Identifier: GPL-3.0-only

//! Meal log and daily nutrition aggregates
//!
//! ```text
//! MealInput ──add_meal──▶ NutritionStore ──save──▶ MealRepository
//!                               │
//!                               ▼
//!                 todays_totals / todays_progress
//! ```

pub mod clock;
pub mod persistence;
pub mod store;
pub mod types;

pub use clock::{Clock, FixedClock, SystemClock};
pub use persistence::{JsonFileRepository, MealRepository, MemoryRepository};
pub use store::NutritionStore;
pub use types::{
    DailyTotals, ImageRef, MacroProgress, Meal, MealId, MealInput, PersistedState, Profile,
    Targets, percent_of,
};
