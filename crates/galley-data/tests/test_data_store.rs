//! Loading the fixture data directory and resolving flights against it.
//!
//! Run with: cargo test --package galley-data --test test_data_store

use std::collections::BTreeMap;

use chrono::NaiveDate;
use galley_data::{DataStore, FlightLabel};
use galley_engine::Protein::{Beef, Chicken, Seafood, Vegetarian};
use galley_engine::{predict, CohortBuilder, SessionOverlay, Signal, WeightSet};
use galley_test_utils::{fixture_config, FLIGHT_DATE, FLIGHT_LABEL, SPARSE_FLIGHT_DATE};
use pretty_assertions::assert_eq;

fn flight_date() -> NaiveDate {
    FLIGHT_DATE.parse().unwrap()
}

#[test]
fn test_loads_all_sources() {
    let (_dir, config) = fixture_config().unwrap();
    let store = DataStore::load(&config.data, &config.cabin).unwrap();

    assert_eq!(store.tables.table(Signal::Nationality).len(), 4);
    assert_eq!(store.tables.table(Signal::Age).len(), 3);
    assert_eq!(store.airport_regions.get("JFK").map(String::as_str), Some("North America"));
    assert_eq!(store.references.len(), 1);
    assert!(store.references.contains_key("SIN JFK"));
}

#[test]
fn test_flight_context_uses_route_override_cabin() {
    let (_dir, config) = fixture_config().unwrap();
    let store = DataStore::load(&config.data, &config.cabin).unwrap();
    let label: FlightLabel = FLIGHT_LABEL.parse().unwrap();

    let ctx = store.flight_context(&label.flight_number, flight_date()).unwrap();
    assert_eq!(ctx.selection.cabin_class, "S");
    assert_eq!(ctx.selection.segment, "SIN JFK");
    assert_eq!(ctx.selection.unique_passengers, 10);
    assert_eq!(ctx.selection.records.len(), 20);
    assert_eq!(ctx.availability["Lunch"].as_slice(), &[Beef, Chicken]);
    assert_eq!(ctx.availability["Dinner"].as_slice(), &[Beef, Seafood, Vegetarian]);

    let reference = ctx.reference_counts("Lunch").unwrap();
    assert_eq!(reference.get(Chicken), Some(7));
    assert_eq!(ctx.reference_counts("Dinner"), None);
}

#[test]
fn test_fixture_prediction_end_to_end() {
    let (_dir, config) = fixture_config().unwrap();
    let store = DataStore::load(&config.data, &config.cabin).unwrap();
    let ctx = store.flight_context("SQ 0024", flight_date()).unwrap();

    let cohorts = CohortBuilder::new().build(&ctx.selection.records);
    let prediction = predict(&cohorts, &store.tables, &ctx.availability, &WeightSet::default());
    let counts = prediction.counts();

    assert_eq!(counts["Lunch"].get(Chicken), Some(6));
    assert_eq!(counts["Lunch"].get(Beef), Some(4));
    assert_eq!(counts["Dinner"].total(), 10);
    assert_eq!(counts["Dinner"].get(Beef), Some(9));
    assert_eq!(prediction.diagnostics.total_fallbacks(), 0);
}

#[test]
fn test_zero_mass_row_counts_as_fallback_with_or_without_overlay() {
    let (_dir, config) = fixture_config().unwrap();
    let store = DataStore::load(&config.data, &config.cabin).unwrap();
    let ctx = store.flight_context("SQ 0328", SPARSE_FLIGHT_DATE.parse().unwrap()).unwrap();
    assert_eq!(ctx.availability["Lunch"].as_slice(), &[Seafood, Vegetarian]);

    let cohorts = CohortBuilder::new().build(&ctx.selection.records);
    let plain = predict(&cohorts, &store.tables, &ctx.availability, &WeightSet::default());
    assert_eq!(plain.diagnostics.fallbacks, BTreeMap::from([(Signal::MealTime, 2)]));
    assert_eq!(plain.counts()["Lunch"].get(Vegetarian), Some(2));

    let overlay = SessionOverlay::seed(&store.tables, &ctx.availability);
    let viewed = predict(&cohorts, &overlay.view(&store.tables), &ctx.availability, &WeightSet::default());
    assert_eq!(viewed.diagnostics, plain.diagnostics);
    assert_eq!(viewed.counts(), plain.counts());
}

#[test]
fn test_summaries_and_listings() {
    let (_dir, config) = fixture_config().unwrap();
    let store = DataStore::load(&config.data, &config.cabin).unwrap();

    let summary = store.customer_summary("SQ 0024", flight_date()).unwrap();
    assert_eq!(summary.total_customers, 13);
    assert_eq!(summary.cabin_distribution, BTreeMap::from([("S".to_string(), 11), ("Y".to_string(), 2)]));
    assert_eq!(summary.analysis_cabin.as_deref(), Some("Y"));
    assert_eq!(summary.day_of_week.name(), "Saturday");

    let listing = store.flights();
    let numbers: Vec<_> = listing.flights.iter().map(|f| f.flight_number.as_str()).collect();
    assert_eq!(numbers, vec!["SQ 0024", "SQ 0328"]);
    assert_eq!(listing.categories, vec!["North America", "South Asia"]);

    let meals = store.meals_by_time("SIN JFK", flight_date());
    assert_eq!(meals["Lunch"][0].cabin_class, "Y");
    assert_eq!(meals["Dinner"].len(), 3);
}

#[test]
fn test_missing_table_fails_load() {
    let (dir, config) = fixture_config().unwrap();
    std::fs::remove_file(dir.path().join("Age.csv")).unwrap();
    let err = DataStore::load(&config.data, &config.cabin).unwrap_err();
    assert!(format!("{err:#}").contains("Age.csv"));
}
