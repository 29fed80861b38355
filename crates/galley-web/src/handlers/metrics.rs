//! Probability tables, importance weights and their validation.

use std::collections::{BTreeMap, BTreeSet};

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use galley_common::{ApiError, ImportanceWeights};
use galley_engine::{
    AvailableProteins, LookupSource, ProbabilityProvider, Protein, ProteinVector, SessionKey, Signal, SignalKey,
    SignalTables,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::handlers::flights::FlightQuery;
use crate::handlers::{format_session_key, parse_date, parse_flight};
use crate::state::SharedState;

/// Allowed distance of a row total from 1.0.
pub const ROW_TOLERANCE: f64 = 0.001;
/// Validation errors returned at most.
pub const MAX_REPORTED_ERRORS: usize = 20;
pub const VALIDATION_FAILED: &str = "Validation failed: Some protein probabilities do not sum to 100%";

#[derive(Debug, Serialize)]
pub struct TableRow {
    pub key: SignalKey,
    pub probabilities: ProteinVector,
    pub reasoning: Option<String>,
    pub sources: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SampleRow {
    pub key: SignalKey,
    /// Restricted to the meal time's proteins and normalised
    pub probabilities: ProteinVector,
    pub source: LookupSource,
}

#[derive(Debug, Serialize)]
pub struct MasterMetrics {
    pub weights: ImportanceWeights,
    pub proteins: Vec<Protein>,
    pub tables: BTreeMap<Signal, Vec<TableRow>>,
    pub available_proteins_by_mealtime: BTreeMap<String, AvailableProteins>,
    /// Rows as a prediction for the flight reads them, per meal time
    pub samples: BTreeMap<Signal, BTreeMap<String, Vec<SampleRow>>>,
    /// Set when `samples` include a session's overrides
    pub session_key: Option<String>,
}

fn table_rows(tables: &SignalTables) -> BTreeMap<Signal, Vec<TableRow>> {
    Signal::ALL
        .into_iter()
        .map(|signal| {
            let rows = tables
                .table(signal)
                .iter()
                .map(|(key, row)| TableRow {
                    key: key.clone(),
                    probabilities: row.probabilities,
                    reasoning: row.reasoning.clone(),
                    sources: row.sources.clone(),
                })
                .collect();
            (signal, rows)
        })
        .collect()
}

/// Every table row resolved for each meal time in `availability`. Rows
/// qualified by another meal time are left out.
pub fn samples<P>(
    tables: &SignalTables,
    provider: &P,
    availability: &BTreeMap<String, AvailableProteins>,
) -> BTreeMap<Signal, BTreeMap<String, Vec<SampleRow>>>
where
    P: ProbabilityProvider + ?Sized,
{
    let mut out: BTreeMap<Signal, BTreeMap<String, Vec<SampleRow>>> = BTreeMap::new();
    for signal in Signal::ALL {
        let per_signal = out.entry(signal).or_default();
        for (meal_time, available) in availability {
            let mut seen = BTreeSet::new();
            let mut rows = Vec::new();
            for (key, _) in tables.table(signal).iter() {
                let own = match key {
                    SignalKey::MealTime { meal_time } => Some(meal_time.as_str()),
                    other => other.qualifier(),
                };
                if own.is_some_and(|mt| mt != meal_time) {
                    continue;
                }
                let lookup_key = key.qualified(meal_time);
                if !seen.insert(lookup_key.clone()) {
                    continue;
                }
                let lookup = provider.lookup(&lookup_key, available);
                rows.push(SampleRow { key: lookup_key, probabilities: lookup.vector, source: lookup.source });
            }
            per_signal.insert(meal_time.clone(), rows);
        }
    }
    out
}

/// GET /api/master-metrics[?flight_number=..&flight_date=..]
///
/// With a flight, samples are restricted to its catalog and read through
/// its session when one is open.
pub async fn api_master_metrics(
    State(state): State<SharedState>,
    Query(q): Query<FlightQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let tables = &state.data.tables;
    let mut metrics = MasterMetrics {
        weights: state.config.weights,
        proteins: Protein::ALL.to_vec(),
        tables: table_rows(tables),
        available_proteins_by_mealtime: BTreeMap::new(),
        samples: BTreeMap::new(),
        session_key: None,
    };

    if let (Some(number), Some(date)) = (q.flight_number.as_deref(), q.flight_date.as_deref()) {
        let label = parse_flight(number)?;
        let date = parse_date(date)?;
        let ctx = state
            .data
            .flight_context(&label.flight_number, date)
            .ok_or_else(|| ApiError::not_found(format!("No passengers found for {} on {date}", label.flight_number)))?;

        let key = SessionKey::new(label.flight_number, date);
        let from_session = state
            .sessions
            .with_session(&key, |overlay| samples(tables, &overlay.view(tables), &ctx.availability))
            .ok();
        metrics.samples = match from_session {
            Some(s) => {
                metrics.session_key = Some(format_session_key(&key));
                s
            }
            None => samples(tables, tables, &ctx.availability),
        };
        metrics.available_proteins_by_mealtime = ctx.availability;
    }

    Ok(Json(metrics))
}

// ── Validation ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct MetricRow {
    pub row: SignalKey,
    /// Defaults to the row's own meal time
    #[serde(default)]
    pub meal_time: Option<String>,
    pub probabilities: ProteinVector,
}

#[derive(Debug, Deserialize, Default)]
pub struct ValidateRequest {
    #[serde(default)]
    pub weights: Option<ImportanceWeights>,
    #[serde(default)]
    pub rows: Vec<MetricRow>,
    /// Proteins each row total is taken over; all proteins when a meal time is missing
    #[serde(default)]
    pub available_proteins_by_mealtime: BTreeMap<String, AvailableProteins>,
}

fn title(signal: Signal) -> &'static str {
    match signal {
        Signal::Nationality => "Nationality",
        Signal::Age => "Age",
        Signal::Destination => "Destination",
        Signal::MealTime => "Meal Time",
    }
}

/// Every problem found, in request order.
pub fn validation_errors(req: &ValidateRequest) -> Vec<String> {
    let mut errors = Vec::new();

    if let Some(weights) = &req.weights {
        if let Some((name, value)) = weights.invalid_component() {
            errors.push(format!("Importance weight {name}: {value} (must be a non-negative number)"));
        }
        if !weights.totals_100() {
            errors.push(format!("Total importance weights: {:.1}% (must equal 100%)", weights.total()));
        }
    }

    for metric in &req.rows {
        let meal_time = metric.meal_time.as_deref().or(match &metric.row {
            SignalKey::MealTime { meal_time } => Some(meal_time.as_str()),
            other => other.qualifier(),
        });
        let available = meal_time.and_then(|mt| req.available_proteins_by_mealtime.get(mt));
        let total: f64 = match available {
            Some(set) => set.iter().filter_map(|p| metric.probabilities.get(p)).sum(),
            None => metric.probabilities.sum(),
        };
        if (total - 1.0).abs() > ROW_TOLERANCE {
            errors.push(format!(
                "{} - {} - {}: Total is {:.1}% (must be 100%)",
                title(metric.row.signal()),
                metric.row,
                meal_time.unwrap_or("all meal times"),
                total * 100.0
            ));
        }
    }
    errors
}

/// POST /api/validate-metrics
pub async fn api_validate_metrics(Json(req): Json<ValidateRequest>) -> Result<impl IntoResponse, ApiError> {
    let errors = validation_errors(&req);
    if !errors.is_empty() {
        warn!(errors = errors.len(), "Metric validation failed");
        let details = errors.into_iter().take(MAX_REPORTED_ERRORS).collect();
        return Err(ApiError::bad_request(VALIDATION_FAILED).with_details(details));
    }
    info!(rows = req.rows.len(), "Metric validation passed");
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "All protein probabilities sum to 100%",
        "rows_checked": req.rows.len(),
    })))
}
