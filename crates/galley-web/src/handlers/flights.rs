//! Flight listing, customer summaries and catalog meals.

use std::collections::BTreeMap;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use galley_common::ApiError;
use serde::{Deserialize, Serialize};

use crate::handlers::require_flight;
use crate::state::SharedState;

#[derive(Debug, Deserialize, Default)]
pub struct FlightQuery {
    pub flight_number: Option<String>,
    pub flight_date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AvailableMeal {
    pub cabin_class: String,
    pub meal_name: String,
    pub meal_pref: String,
}

#[derive(Debug, Serialize)]
pub struct AvailableMeals {
    pub flight_number: String,
    pub flight_date: NaiveDate,
    pub segment: String,
    pub meals: BTreeMap<String, Vec<AvailableMeal>>,
}

/// GET /api/flights
pub async fn api_flights(State(state): State<SharedState>) -> impl IntoResponse {
    Json(state.data.flights())
}

/// GET /api/customer-summary?flight_number=..&flight_date=..
pub async fn api_customer_summary(
    State(state): State<SharedState>,
    Query(q): Query<FlightQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (label, date) = require_flight(q.flight_number.as_deref(), q.flight_date.as_deref())?;
    let summary = state
        .data
        .customer_summary(&label.flight_number, date)
        .ok_or_else(|| ApiError::not_found(format!("No passengers found for {} on {date}", label.flight_number)))?;
    Ok(Json(summary))
}

/// GET /api/available-meals?flight_number=SQ 0024 (SIN → JFK)&flight_date=..
///
/// The flight label must carry its route; the segment is taken from it.
pub async fn api_available_meals(
    State(state): State<SharedState>,
    Query(q): Query<FlightQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (label, date) = require_flight(q.flight_number.as_deref(), q.flight_date.as_deref())?;
    let segment = label
        .segment()
        .ok_or_else(|| ApiError::bad_request(format!("Flight '{label}' has no route, expected e.g. 'SQ 0024 (SIN → JFK)'")))?;

    let meals = state
        .data
        .meals_by_time(&segment, date)
        .into_iter()
        .map(|(meal_time, entries)| {
            let meals = entries
                .into_iter()
                .map(|m| AvailableMeal {
                    cabin_class: m.cabin_class.clone(),
                    meal_name: m.meal_name.clone(),
                    meal_pref: m.meal_pref.clone(),
                })
                .collect();
            (meal_time, meals)
        })
        .collect();

    Ok(Json(AvailableMeals { flight_number: label.flight_number, flight_date: date, segment, meals }))
}
