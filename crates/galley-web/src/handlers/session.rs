//! Per-session probability overrides.
//!
//! A session is one flight on one date. Initialising it seeds every table
//! row, restricted to each meal time's available proteins; updates then edit
//! single rows and predictions for that flight read through them.

use std::collections::BTreeMap;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use galley_common::ApiError;
use galley_engine::{AvailableProteins, EngineError, ProteinVector, SessionKey, SessionOverlay, Signal, SignalKey};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::handlers::{engine_error, format_session_key, require_flight, resolve_session_key};
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct InitializeRequest {
    pub flight_number: Option<String>,
    pub flight_date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InitializeResponse {
    pub success: bool,
    pub session_key: String,
    pub cabin_class: String,
    /// Seeded rows per signal, plus `total_rows`
    pub summary: BTreeMap<String, usize>,
    pub available_proteins_by_mealtime: BTreeMap<String, AvailableProteins>,
}

/// POST /api/initialize-session
///
/// Replaces any earlier session for the same flight and date.
pub async fn initialize_session(
    State(state): State<SharedState>,
    Json(req): Json<InitializeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (label, date) = require_flight(req.flight_number.as_deref(), req.flight_date.as_deref())?;
    let ctx = state
        .data
        .flight_context(&label.flight_number, date)
        .ok_or_else(|| ApiError::not_found(format!("No passengers found for {} on {date}", label.flight_number)))?;
    if ctx.availability.is_empty() {
        return Err(ApiError::not_found(format!(
            "No catalog meals for {} in cabin {} on {date}",
            ctx.selection.segment, ctx.selection.cabin_class
        )));
    }

    let overlay = SessionOverlay::seed(&state.data.tables, &ctx.availability);
    let mut summary: BTreeMap<String, usize> = Signal::ALL.iter().map(|s| (s.as_str().to_string(), 0)).collect();
    for (key, _) in overlay.rows() {
        *summary.entry(key.signal().as_str().to_string()).or_insert(0) += 1;
    }
    summary.insert("total_rows".to_string(), overlay.len());

    let key = SessionKey::new(label.flight_number, date);
    state.sessions.initialize(key.clone(), overlay);

    Ok(Json(InitializeResponse {
        success: true,
        session_key: format_session_key(&key),
        cabin_class: ctx.selection.cabin_class.clone(),
        summary,
        available_proteins_by_mealtime: ctx.availability.clone(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub session_key: Option<String>,
    pub flight_number: Option<String>,
    pub flight_date: Option<String>,
    pub row: SignalKey,
    /// Proteins not named keep their current value
    #[serde(default)]
    pub probabilities: ProteinVector,
    /// Restore the row's default instead of applying `probabilities`
    #[serde(default)]
    pub reset: bool,
}

#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    pub success: bool,
    /// `user_modified` or `no_change`
    pub marker: &'static str,
    pub row: SignalKey,
    pub current: ProteinVector,
    pub version: u64,
}

fn marker(modified: bool) -> &'static str {
    if modified { "user_modified" } else { "no_change" }
}

/// POST /api/update-session-probability
pub async fn update_session_probability(
    State(state): State<SharedState>,
    Json(req): Json<UpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let key = resolve_session_key(req.session_key.as_deref(), req.flight_number.as_deref(), req.flight_date.as_deref())?;

    let (modified, current, version) = state
        .sessions
        .with_session(&key, |overlay| -> galley_engine::Result<_> {
            if req.reset {
                overlay.reset(&req.row)?;
            } else {
                overlay.update(&req.row, &req.probabilities)?;
            }
            let row = overlay.row(&req.row).ok_or_else(|| EngineError::RowNotFound(req.row.clone()))?;
            Ok((row.modified, row.current, overlay.version()))
        })
        .and_then(|inner| inner)
        .map_err(engine_error)?;

    if modified {
        info!(session = %key, row = %req.row, "Session row modified");
    }
    Ok(Json(UpdateResponse { success: true, marker: marker(modified), row: req.row, current, version }))
}

#[derive(Debug, Deserialize, Default)]
pub struct SessionQuery {
    pub session_key: Option<String>,
    pub flight_number: Option<String>,
    pub flight_date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ModifiedRow {
    pub metric_type: Signal,
    /// Human-readable form of `row`
    pub row_key: String,
    pub row: SignalKey,
    pub default: ProteinVector,
    pub current: ProteinVector,
    pub available: AvailableProteins,
}

#[derive(Debug, Serialize)]
pub struct ModifiedRows {
    pub success: bool,
    pub session_key: String,
    pub modified_rows: Vec<ModifiedRow>,
    pub count: usize,
}

/// GET /api/get-modified-rows?session_key=..
pub async fn get_modified_rows(
    State(state): State<SharedState>,
    Query(q): Query<SessionQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let key = resolve_session_key(q.session_key.as_deref(), q.flight_number.as_deref(), q.flight_date.as_deref())?;
    let modified_rows: Vec<ModifiedRow> = state
        .sessions
        .with_session(&key, |overlay| {
            overlay
                .modified_rows()
                .map(|(row, data)| ModifiedRow {
                    metric_type: row.signal(),
                    row_key: row.to_string(),
                    row: row.clone(),
                    default: data.default,
                    current: data.current,
                    available: data.available.clone(),
                })
                .collect()
        })
        .map_err(engine_error)?;

    Ok(Json(ModifiedRows {
        success: true,
        session_key: format_session_key(&key),
        count: modified_rows.len(),
        modified_rows,
    }))
}

#[derive(Debug, Deserialize, Default)]
pub struct ClearRequest {
    pub session_key: Option<String>,
    pub flight_number: Option<String>,
    pub flight_date: Option<String>,
}

/// POST /api/clear-session
///
/// Clears the named session, or every session when none is named.
pub async fn clear_session(
    State(state): State<SharedState>,
    Json(req): Json<ClearRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let named = req.session_key.is_some() || req.flight_number.is_some() || req.flight_date.is_some();
    let cleared = if named {
        let key = resolve_session_key(req.session_key.as_deref(), req.flight_number.as_deref(), req.flight_date.as_deref())?;
        usize::from(state.sessions.clear(&key))
    } else {
        state.sessions.clear_all()
    };
    Ok(Json(serde_json::json!({ "success": true, "cleared": cleared })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_update_request_reads_typed_row_keys() {
        let req: UpdateRequest = serde_json::from_value(serde_json::json!({
            "session_key": "SQ 0024|2025-03-15",
            "row": {"signal": "nationality", "nationality_code": "SG", "day_of_week": "Saturday", "meal_time": "Lunch"},
            "probabilities": {"Chicken": 0.5, "Beef": 0.5}
        }))
        .unwrap();
        assert_eq!(req.row.signal(), Signal::Nationality);
        assert_eq!(req.row.qualifier(), Some("Lunch"));
        assert_eq!(req.probabilities.len(), 2);
        assert!(!req.reset);
    }

    #[test]
    fn test_marker_names() {
        assert_eq!(marker(true), "user_modified");
        assert_eq!(marker(false), "no_change");
    }
}
