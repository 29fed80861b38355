//! Meal predictions for one flight and date.

use std::collections::BTreeMap;

use axum::{extract::State, response::IntoResponse, Json};
use chrono::NaiveDate;
use galley_common::{ApiError, ImportanceWeights};
use galley_data::{meal_lines, MealLine, PassengerSelection};
use galley_engine::{
    predict, Aggregation, CohortBreakdown, CohortBuilder, DayOfWeek, Diagnostics, LookupSource, ProbabilityProvider,
    ProteinCounts, ProteinVector, SessionKey, Signal, SignalKey, SignalTables, WeightSet,
};
use galley_llm::{PassengerGroup, SummaryRequest, TopNationality};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::handlers::{parse_date, parse_flight};
use crate::state::SharedState;

const TOP_NATIONALITIES: usize = 5;

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    /// Flight number or full label
    pub flight_number: String,
    pub flight_date: String,
    /// Percentages; the configured weights when absent
    #[serde(default)]
    pub weights: Option<ImportanceWeights>,
    #[serde(default = "default_include_summary")]
    pub include_summary: bool,
}

fn default_include_summary() -> bool {
    true
}

/// One cohort as returned to the client.
#[derive(Debug, Clone, Serialize)]
pub struct PassengerDetail {
    #[serde(flatten)]
    pub group: PassengerGroup,
    pub counts: ProteinCounts,
    pub sources: BTreeMap<Signal, LookupSource>,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub run_id: Uuid,
    pub flight_number: String,
    pub flight_date: NaiveDate,
    pub day_of_week: DayOfWeek,
    pub cabin_class: String,
    /// Distinct passengers in the predicted cabin
    pub total_passengers: usize,
    pub total_meals: u32,
    /// Predicted counts per meal time, with reference counts where known
    pub meal_times: Aggregation<String>,
    pub original_counts: BTreeMap<String, ProteinCounts>,
    pub meal_lines: BTreeMap<String, Vec<MealLine>>,
    pub passenger_details: Vec<PassengerDetail>,
    pub weights_used: ImportanceWeights,
    pub custom_weights: bool,
    /// Predicted through an open session's overrides
    pub session_used: bool,
    pub modified_rows: usize,
    pub top_nationalities: Vec<TopNationality>,
    pub ai_summaries: BTreeMap<String, String>,
    pub diagnostics: Diagnostics,
}

fn vector_map(vector: &ProteinVector) -> BTreeMap<String, f64> {
    vector.iter().map(|(p, v)| (p.to_string(), v)).collect()
}

fn counts_map(counts: &ProteinCounts) -> BTreeMap<String, f64> {
    counts.iter().map(|(p, c)| (p.to_string(), f64::from(c))).collect()
}

fn weights_map(weights: &ImportanceWeights) -> BTreeMap<String, f64> {
    BTreeMap::from([
        ("nationality_importance".to_string(), weights.nationality_importance),
        ("age_importance".to_string(), weights.age_importance),
        ("destination_importance".to_string(), weights.destination_importance),
        ("mealtime_importance".to_string(), weights.mealtime_importance),
    ])
}

fn passenger_detail(breakdown: &CohortBreakdown, destination_airport: &str, tables: &SignalTables) -> PassengerDetail {
    let key = &breakdown.cohort.key;
    let mut metric_probabilities = BTreeMap::new();
    let mut reasoning = BTreeMap::new();
    let mut sources = BTreeMap::new();
    for (signal, detail) in &breakdown.signals {
        metric_probabilities.insert(signal.to_string(), vector_map(&detail.vector));
        sources.insert(*signal, detail.source);
        if let Some(text) = tables.row(&detail.key).and_then(|r| r.reasoning.clone()) {
            reasoning.insert(signal.to_string(), text);
        }
    }

    PassengerDetail {
        group: PassengerGroup {
            nationality: key.nationality_code.clone(),
            age_group: key.age_group.clone(),
            destination: format!("{destination_airport} ({})", key.destination_region),
            meal_time: key.meal_time.clone(),
            weekday: key.day_of_week.to_string(),
            count: breakdown.cohort.passenger_count,
            probabilities: vector_map(&breakdown.final_distribution),
            metric_probabilities,
            reasoning,
        },
        counts: breakdown.counts,
        sources,
    }
}

/// Most frequent nationalities across the selection's records, with the
/// notes of their nationality row for the flight's weekday.
pub fn top_nationalities(selection: &PassengerSelection, tables: &SignalTables) -> Vec<TopNationality> {
    let total = selection.unique_passengers.max(1) as f64;
    let mut ranked: Vec<(&str, u32)> = selection
        .nationality_counts
        .iter()
        .map(|(code, n)| (code.as_str(), u32::try_from(*n).unwrap_or(u32::MAX)))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(TOP_NATIONALITIES)
        .map(|(code, count)| {
            let row = tables.row(&SignalKey::nationality(code, selection.day_of_week));
            TopNationality {
                nationality_code: code.to_string(),
                count,
                percentage: (f64::from(count) / total * 1000.0).round() / 10.0,
                reasoning: row.and_then(|r| r.reasoning.clone()).unwrap_or_default(),
                sources: row.and_then(|r| r.sources.clone()).unwrap_or_default(),
            }
        })
        .collect()
}

/// Why request weights cannot be used, if they cannot.
pub fn weight_error(weights: &ImportanceWeights) -> Option<String> {
    if let Some((name, value)) = weights.invalid_component() {
        return Some(format!("Importance weight {name} must be a non-negative number, got {value}"));
    }
    (!weights.totals_100()).then(|| format!("Importance weights must total 100%, got {:.1}%", weights.total()))
}

/// POST /api/predict
pub async fn api_predict(
    State(state): State<SharedState>,
    Json(req): Json<PredictRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let label = parse_flight(&req.flight_number)?;
    let date = parse_date(&req.flight_date)?;
    // Request weights must total 100; configured ones were only warned about at load.
    let weights = match req.weights {
        Some(w) => {
            if let Some(message) = weight_error(&w) {
                return Err(ApiError::bad_request(message));
            }
            w
        }
        None => state.config.weights,
    };
    let mut weight_set = WeightSet::from(&weights);
    weight_set.normalise();

    let data = &state.data;
    let ctx = data
        .flight_context(&label.flight_number, date)
        .ok_or_else(|| ApiError::not_found(format!("No passengers found for {} on {date}", label.flight_number)))?;
    let selection = &ctx.selection;
    let cohorts = CohortBuilder::new().build(&selection.records);

    let session = SessionKey::new(label.flight_number.clone(), date);
    let from_session = state.sessions.with_session(&session, |overlay| {
        let prediction = predict(&cohorts, &overlay.view(&data.tables), &ctx.availability, &weight_set);
        (prediction, overlay.modified_rows().count())
    });
    let (mut prediction, modified_rows, session_used) = match from_session {
        Ok((prediction, modified)) => (prediction, modified, true),
        Err(_) => (predict(&cohorts, &data.tables, &ctx.availability, &weight_set), 0, false),
    };

    let meal_times: Vec<String> = prediction.meal_counts.keys().cloned().collect();
    let mut original_counts = BTreeMap::new();
    for meal_time in &meal_times {
        if let Some(reference) = ctx.reference_counts(meal_time) {
            prediction.meal_counts.annotate_reference(meal_time, reference);
            original_counts.insert(meal_time.clone(), reference);
        }
    }

    let lines: BTreeMap<String, Vec<MealLine>> = ctx
        .meals
        .iter()
        .map(|(meal_time, meals)| {
            let counts = prediction.meal_counts.predicted(meal_time).copied().unwrap_or_default();
            (meal_time.clone(), meal_lines(meals, &counts, counts.total()))
        })
        .collect();

    let passenger_details: Vec<PassengerDetail> = prediction
        .breakdowns
        .iter()
        .map(|b| passenger_detail(b, &selection.destination_airport, &data.tables))
        .collect();
    let top = top_nationalities(selection, &data.tables);

    let mut ai_summaries = BTreeMap::new();
    if req.include_summary && state.summarizer.is_enabled() {
        for meal_time in &meal_times {
            let summary_req = SummaryRequest {
                flight_number: label.to_string(),
                flight_date: date.to_string(),
                passenger_groups: passenger_details
                    .iter()
                    .filter(|d| d.group.meal_time == *meal_time)
                    .map(|d| d.group.clone())
                    .collect(),
                weights: weights_map(&weights),
                prediction_results: prediction.meal_counts.predicted(meal_time).map(counts_map).unwrap_or_default(),
                original_counts: original_counts.get(meal_time).map(counts_map).unwrap_or_default(),
                top_nationalities: top.clone(),
            };
            ai_summaries.insert(meal_time.clone(), state.summarizer.summarize(&summary_req).await);
        }
    }

    let run_id = Uuid::new_v4();
    info!(
        %run_id,
        flight = %label.flight_number,
        %date,
        cabin = %selection.cabin_class,
        meals = prediction.total_meals(),
        session_used,
        modified_rows,
        "Prediction served"
    );

    Ok(Json(PredictResponse {
        run_id,
        flight_number: label.flight_number.clone(),
        flight_date: date,
        day_of_week: selection.day_of_week,
        cabin_class: selection.cabin_class.clone(),
        total_passengers: selection.unique_passengers,
        total_meals: prediction.total_meals(),
        meal_times: prediction.meal_counts,
        original_counts,
        meal_lines: lines,
        passenger_details,
        weights_used: weights,
        custom_weights: !weights.is_default(),
        session_used,
        modified_rows,
        top_nationalities: top,
        ai_summaries,
        diagnostics: prediction.diagnostics,
    }))
}
