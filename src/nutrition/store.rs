// SPDX-License-Identifier: GPL-3.0-only

//! Nutrition store
//!
//! Single source of truth for the profile, the daily targets and the meal
//! log. Aggregates are recomputed from the log on every read. Mutations hold
//! the write lock until the repository has saved, and are undone if the save
//! fails, so readers only ever see persisted states.

use super::clock::Clock;
use super::persistence::MealRepository;
use super::types::{
    DailyTotals, MacroProgress, Meal, MealId, MealInput, PersistedState, Profile, Targets,
};
use crate::constants::nutrition::STATE_VERSION;
use crate::errors::{StoreError, StoreResult};
use chrono::NaiveDate;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

pub struct NutritionStore {
    state: RwLock<PersistedState>,
    repo: Arc<dyn MealRepository>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for NutritionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read();
        f.debug_struct("NutritionStore")
            .field("meals", &state.meals.len())
            .field("targets", &state.targets)
            .field("clock", &self.clock)
            .finish()
    }
}

impl NutritionStore {
    /// Load the saved state, or start empty with `default_targets`
    pub fn open(
        repo: Arc<dyn MealRepository>,
        clock: Arc<dyn Clock>,
        default_targets: Targets,
    ) -> StoreResult<Self> {
        default_targets.validate()?;

        let state = match repo.load()? {
            Some(mut state) => {
                if state.version > STATE_VERSION {
                    return Err(StoreError::Persistence(format!(
                        "saved state version {} is newer than supported version {}",
                        state.version, STATE_VERSION
                    )));
                }
                if let Err(e) = state.targets.validate() {
                    warn!(error = %e, "Saved targets invalid, using defaults");
                    state.targets = default_targets;
                }
                state.version = STATE_VERSION;
                state
            }
            None => PersistedState::new(default_targets),
        };

        info!(meals = state.meals.len(), "Nutrition store opened");
        Ok(Self {
            state: RwLock::new(state),
            repo,
            clock,
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, PersistedState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, PersistedState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply `change` and persist, restoring the previous state on failure
    fn mutate<T>(
        &self,
        change: impl FnOnce(&mut PersistedState) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut state = self.write();
        let previous = state.clone();
        let result = change(&mut *state)?;

        if let Err(e) = self.repo.save(&state) {
            warn!(error = %e, "Save failed, mutation rolled back");
            *state = previous;
            return Err(e);
        }
        Ok(result)
    }

    /// Log a meal with a fresh id and the current time
    pub fn add_meal(&self, input: MealInput) -> StoreResult<Meal> {
        input.validate()?;
        let meal = Meal::from_input(input, MealId::new(), self.clock.now());

        self.mutate(|state| {
            state.meals.push(meal.clone());
            Ok(())
        })?;

        info!(meal_id = %meal.id, name = %meal.name, calories = meal.calories, "Meal added");
        Ok(meal)
    }

    /// Remove a meal, returning it
    pub fn delete_meal(&self, id: MealId) -> StoreResult<Meal> {
        let meal = self.mutate(|state| {
            let index = state
                .meals
                .iter()
                .position(|meal| meal.id == id)
                .ok_or(StoreError::NotFound(id))?;
            Ok(state.meals.remove(index))
        })?;

        info!(meal_id = %id, name = %meal.name, "Meal deleted");
        Ok(meal)
    }

    /// Meals logged between local midnight and now, in insertion order
    pub fn todays_meals(&self) -> Vec<Meal> {
        let now = self.clock.now();
        let today = self.clock.local_date(now);
        self.read()
            .meals
            .iter()
            .filter(|meal| meal.time <= now && self.clock.local_date(meal.time) == today)
            .cloned()
            .collect()
    }

    /// Sum over [`todays_meals`](Self::todays_meals); zero when empty
    pub fn todays_totals(&self) -> DailyTotals {
        DailyTotals::from_meals(&self.todays_meals())
    }

    /// Today's totals as a percentage of the targets
    pub fn todays_progress(&self) -> MacroProgress {
        let totals = self.todays_totals();
        totals.progress(&self.targets())
    }

    /// The whole log in insertion order
    pub fn meals(&self) -> Vec<Meal> {
        self.read().meals.clone()
    }

    pub fn meal(&self, id: MealId) -> Option<Meal> {
        self.read().meals.iter().find(|meal| meal.id == id).cloned()
    }

    /// Meals whose local date is `date`
    pub fn meals_on(&self, date: NaiveDate) -> Vec<Meal> {
        self.read()
            .meals
            .iter()
            .filter(|meal| self.clock.local_date(meal.time) == date)
            .cloned()
            .collect()
    }

    pub fn totals_on(&self, date: NaiveDate) -> DailyTotals {
        DailyTotals::from_meals(&self.meals_on(date))
    }

    pub fn profile(&self) -> Profile {
        self.read().profile.clone()
    }

    pub fn update_profile(&self, profile: Profile) -> StoreResult<()> {
        self.mutate(|state| {
            state.profile = profile;
            Ok(())
        })?;
        debug!("Profile updated");
        Ok(())
    }

    pub fn targets(&self) -> Targets {
        self.read().targets
    }

    pub fn update_targets(&self, targets: Targets) -> StoreResult<()> {
        targets.validate()?;
        self.mutate(|state| {
            state.targets = targets;
            Ok(())
        })?;
        info!(?targets, "Targets updated");
        Ok(())
    }

    /// Copy of the full state
    pub fn snapshot(&self) -> PersistedState {
        self.read().clone()
    }

    /// Save the current state again
    pub fn flush(&self) -> StoreResult<()> {
        let state = self.read();
        self.repo.save(&state)
    }

    /// Flush and drop the store
    pub fn close(self) -> StoreResult<()> {
        self.flush()?;
        info!("Nutrition store closed");
        Ok(())
    }
}
