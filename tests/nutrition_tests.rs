// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the nutrition store

use chrono::{DateTime, FixedOffset, NaiveDate, TimeDelta};
use mealcam::classifier::{FixedClassifier, LogOutcome, log_artifact};
use mealcam::errors::{AppError, StoreError};
use mealcam::media::PhotoEncoder;
use mealcam::nutrition::{
    DailyTotals, FixedClock, ImageRef, JsonFileRepository, MealId, MealInput, MemoryRepository,
    NutritionStore, Profile, Targets,
};
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

fn at(rfc3339: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(rfc3339).unwrap()
}

fn store_at(now: &str) -> (NutritionStore, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::new(at(now)));
    let store = NutritionStore::open(
        Arc::new(MemoryRepository::new()),
        clock.clone(),
        Targets::default(),
    )
    .unwrap();
    (store, clock)
}

fn photo() -> mealcam::ImageArtifact {
    let img = image::RgbImage::from_pixel(8, 8, image::Rgb([220, 180, 60]));
    let mut png = Vec::new();
    img.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();
    PhotoEncoder::default().normalize(&png).unwrap()
}

#[test]
fn test_oatmeal_breakfast_totals() {
    let (store, _clock) = store_at("2026-05-04T08:00:00+02:00");

    store
        .add_meal(MealInput::new("Oatmeal", 300.0, 10.0, 50.0, 5.0))
        .unwrap();

    assert_eq!(
        store.todays_totals(),
        DailyTotals {
            calories: 300.0,
            protein: 10.0,
            carbs: 50.0,
            fat: 5.0,
        }
    );
}

#[test]
fn test_yesterday_late_meal_not_today() {
    let (store, clock) = store_at("2026-05-03T23:59:00+02:00");
    let snack = store
        .add_meal(MealInput::new("Crackers", 120.0, 2.0, 20.0, 4.0))
        .unwrap();
    assert_eq!(store.todays_meals().len(), 1);

    clock.advance(TimeDelta::minutes(2));

    assert!(store.todays_meals().is_empty());
    assert_eq!(store.todays_totals(), DailyTotals::default());
    let yesterday = NaiveDate::from_ymd_opt(2026, 5, 3).unwrap();
    assert_eq!(store.meals_on(yesterday), vec![snack]);
}

#[test]
fn test_delete_unknown_id_is_not_found() {
    let (store, _clock) = store_at("2026-05-04T12:00:00+02:00");
    store
        .add_meal(MealInput::new("Salad", 250.0, 8.0, 12.0, 18.0))
        .unwrap();

    let missing = MealId::new();
    assert_eq!(store.delete_meal(missing), Err(StoreError::NotFound(missing)));
    assert_eq!(store.meals().len(), 1);
}

#[test]
fn test_delete_subtracts_exactly_that_meal() {
    let (store, clock) = store_at("2026-05-04T07:30:00+02:00");
    let inputs = [
        MealInput::new("Eggs", 155.0, 13.0, 1.1, 11.0),
        MealInput::new("Rice bowl", 520.0, 18.5, 88.0, 9.25),
        MealInput::new("Apple", 95.0, 0.5, 25.0, 0.3),
    ];
    let mut ids = Vec::new();
    for input in inputs {
        ids.push(store.add_meal(input).unwrap().id);
        clock.advance(TimeDelta::hours(2));
    }

    for id in ids {
        let before = store.todays_totals();
        let removed = store.delete_meal(id).unwrap();
        let after = store.todays_totals();

        assert!(store.todays_meals().iter().all(|m| m.id != id));
        assert!((before.calories - removed.calories - after.calories).abs() < 1e-9);
        assert!((before.protein - removed.protein - after.protein).abs() < 1e-9);
        assert!((before.carbs - removed.carbs - after.carbs).abs() < 1e-9);
        assert!((before.fat - removed.fat - after.fat).abs() < 1e-9);
    }
    assert_eq!(store.todays_totals(), DailyTotals::default());
}

#[test]
fn test_empty_day_totals_are_zero() {
    let (store, _clock) = store_at("2026-05-04T12:00:00+02:00");
    assert_eq!(store.todays_totals(), DailyTotals::default());
    assert_eq!(store.todays_progress().calories, Some(0));
}

#[test]
fn test_todays_meals_in_insertion_order() {
    let (store, clock) = store_at("2026-05-04T06:00:00+02:00");
    for name in ["Breakfast", "Lunch", "Dinner"] {
        store
            .add_meal(MealInput::new(name, 100.0, 1.0, 1.0, 1.0))
            .unwrap();
        clock.advance(TimeDelta::hours(5));
    }

    let names: Vec<String> = store.todays_meals().into_iter().map(|m| m.name).collect();
    assert_eq!(names, ["Breakfast", "Lunch", "Dinner"]);
}

#[test]
fn test_progress_against_targets() {
    let (store, _clock) = store_at("2026-05-04T12:00:00+02:00");
    store
        .update_targets(Targets::new(2000.0, 100.0, 300.0, 70.0).unwrap())
        .unwrap();
    store
        .add_meal(MealInput::new("Pasta", 660.0, 25.0, 95.0, 14.0))
        .unwrap();

    let progress = store.todays_progress();
    assert_eq!(progress.calories, Some(33));
    assert_eq!(progress.protein, Some(25));
    assert_eq!(progress.carbs, Some(32));
    assert_eq!(progress.fat, Some(20));
}

#[test]
fn test_readers_never_see_partial_mutation() {
    let (store, _clock) = store_at("2026-05-04T12:00:00+02:00");
    let writing = AtomicBool::new(true);

    std::thread::scope(|scope| {
        let writers: Vec<_> = (0..2)
            .map(|_| {
                scope.spawn(|| {
                    for round in 0..50 {
                        let meal = store
                            .add_meal(MealInput::new("Portion", 100.0, 4.0, 10.0, 5.0))
                            .unwrap();
                        if round % 2 == 0 {
                            store.delete_meal(meal.id).unwrap();
                        }
                    }
                })
            })
            .collect();

        for _ in 0..3 {
            scope.spawn(|| {
                while writing.load(Ordering::SeqCst) {
                    let totals = store.todays_totals();
                    let portions = totals.calories / 100.0;
                    assert_eq!(portions.fract(), 0.0, "torn totals: {:?}", totals);
                    assert_eq!(totals.protein, portions * 4.0);
                    assert_eq!(totals.carbs, portions * 10.0);
                    assert_eq!(totals.fat, portions * 5.0);
                }
            });
        }

        let results: Vec<_> = writers.into_iter().map(|w| w.join()).collect();
        writing.store(false, Ordering::SeqCst);
        assert!(results.iter().all(Result::is_ok));
    });

    assert_eq!(store.todays_meals().len(), 50);
    assert_eq!(store.todays_totals().calories, 5000.0);
}

#[test]
fn test_rejected_saves_invisible_to_readers() {
    let repo = Arc::new(MemoryRepository::new());
    let clock = Arc::new(FixedClock::new(at("2026-05-04T12:00:00+02:00")));
    let store = NutritionStore::open(repo.clone(), clock, Targets::default()).unwrap();
    store
        .add_meal(MealInput::new("Soup", 300.0, 12.0, 30.0, 10.0))
        .unwrap();
    repo.set_fail_saves(true);
    let writing = AtomicBool::new(true);

    std::thread::scope(|scope| {
        let writer = scope.spawn(|| {
            for _ in 0..100 {
                let result = store.add_meal(MealInput::new("Cake", 450.0, 5.0, 60.0, 20.0));
                assert!(matches!(result, Err(StoreError::Persistence(_))));
            }
        });

        for _ in 0..3 {
            scope.spawn(|| {
                while writing.load(Ordering::SeqCst) {
                    assert_eq!(store.todays_totals().calories, 300.0);
                    assert!(store.meals().iter().all(|m| m.name != "Cake"));
                }
            });
        }

        let result = writer.join();
        writing.store(false, Ordering::SeqCst);
        assert!(result.is_ok());
    });

    assert_eq!(store.meals().len(), 1);
    assert_eq!(repo.save_count(), 1);
}

#[test]
fn test_json_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("meals.json");
    let clock = Arc::new(FixedClock::new(at("2026-05-04T13:00:00+02:00")));

    let id = {
        let store = NutritionStore::open(
            Arc::new(JsonFileRepository::new(&path)),
            clock.clone(),
            Targets::default(),
        )
        .unwrap();
        store
            .update_profile(Profile {
                name: Some("Sam".to_string()),
            })
            .unwrap();
        let meal = store
            .add_meal(MealInput::new("Curry", 700.0, 30.0, 80.0, 25.0))
            .unwrap();
        store.close().unwrap();
        meal.id
    };

    let store = NutritionStore::open(
        Arc::new(JsonFileRepository::new(&path)),
        clock,
        Targets::default(),
    )
    .unwrap();
    assert_eq!(store.profile().name.as_deref(), Some("Sam"));
    assert_eq!(store.meal(id).map(|m| m.name), Some("Curry".to_string()));
    assert_eq!(store.todays_totals().calories, 700.0);
}

#[test]
fn test_json_store_moves_images_out_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let repo = JsonFileRepository::new(dir.path().join("meals.json"));
    let images = repo.images_dir().to_path_buf();
    let clock = Arc::new(FixedClock::new(at("2026-05-04T19:00:00+02:00")));
    let store = NutritionStore::open(Arc::new(repo), clock, Targets::default()).unwrap();

    let meal = store
        .add_meal(
            MealInput::new("Pizza", 850.0, 35.0, 95.0, 32.0)
                .with_image(ImageRef::Artifact(photo())),
        )
        .unwrap();
    let image_file = images.join(format!("{}.jpg", meal.id));
    assert!(image_file.exists());

    let saved = std::fs::read_to_string(dir.path().join("meals.json")).unwrap();
    assert!(saved.contains("\"uri\""));
    assert!(!saved.contains("\"artifact\""));

    store.delete_meal(meal.id).unwrap();
    assert!(!image_file.exists());
}

#[tokio::test]
async fn test_classified_photo_is_logged_with_image() {
    let (store, _clock) = store_at("2026-05-04T12:30:00+02:00");
    let classifier = FixedClassifier::meal(MealInput::new("Burrito", 690.0, 28.0, 80.0, 26.0));
    let artifact = photo();

    let outcome = log_artifact(&classifier, &store, artifact.clone())
        .await
        .unwrap();
    let meal = match outcome {
        LogOutcome::Logged(meal) => meal,
        other => panic!("expected a logged meal, got {:?}", other),
    };
    assert_eq!(meal.image, Some(ImageRef::Artifact(artifact)));
    assert_eq!(store.todays_meals(), vec![meal]);
}

#[tokio::test]
async fn test_barcode_logs_nothing() {
    let (store, _clock) = store_at("2026-05-04T12:30:00+02:00");
    let classifier = FixedClassifier::barcode("4006381333931");

    let outcome = log_artifact(&classifier, &store, photo()).await.unwrap();
    assert_eq!(outcome, LogOutcome::Barcode("4006381333931".to_string()));
    assert!(store.meals().is_empty());
}

#[tokio::test]
async fn test_classified_negative_macros_rejected() {
    let (store, _clock) = store_at("2026-05-04T12:30:00+02:00");
    let classifier = FixedClassifier::meal(MealInput::new("Glitch", -5.0, 0.0, 0.0, 0.0));

    let err = log_artifact(&classifier, &store, photo()).await.unwrap_err();
    assert!(matches!(err, AppError::Store(StoreError::InvalidMeal(_))));
    assert!(store.meals().is_empty());
}
