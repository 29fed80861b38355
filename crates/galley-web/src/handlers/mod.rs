//! HTTP handlers for all API routes.

pub mod health;
pub mod flights;
pub mod metrics;
pub mod session;
pub mod predict;
pub mod summary;

use chrono::NaiveDate;
use galley_common::ApiError;
use galley_data::dates::parse_iso_date;
use galley_data::FlightLabel;
use galley_engine::{EngineError, SessionKey};

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, ApiError> {
    parse_iso_date(raw)
        .ok_or_else(|| ApiError::bad_request(format!("Invalid flight_date '{raw}', expected YYYY-MM-DD")))
}

/// Accepts `SQ 0024` as well as `SQ 0024 (SIN → JFK)`.
pub(crate) fn parse_flight(raw: &str) -> Result<FlightLabel, ApiError> {
    raw.parse::<FlightLabel>().map_err(|e| ApiError::bad_request(e.to_string()))
}

/// Both query parameters, or a 400.
pub(crate) fn require_flight(
    flight_number: Option<&str>,
    flight_date: Option<&str>,
) -> Result<(FlightLabel, NaiveDate), ApiError> {
    match (flight_number, flight_date) {
        (Some(number), Some(date)) if !number.trim().is_empty() => Ok((parse_flight(number)?, parse_date(date)?)),
        _ => Err(ApiError::bad_request("flight_number and flight_date required")),
    }
}

// ── Session keys ──────────────────────────────────────────────────────────────

/// Wire form of a session key: `<flight>|<YYYY-MM-DD>`.
pub(crate) fn format_session_key(key: &SessionKey) -> String {
    format!("{}|{}", key.flight_number, key.flight_date)
}

pub(crate) fn parse_session_key(raw: &str) -> Result<SessionKey, ApiError> {
    let (flight, date) = raw
        .rsplit_once('|')
        .ok_or_else(|| ApiError::bad_request(format!("Invalid session_key '{raw}', expected <flight>|<date>")))?;
    let label = parse_flight(flight)?;
    Ok(SessionKey::new(label.flight_number, parse_date(date)?))
}

/// A session named either by `session_key` or by flight number and date.
pub(crate) fn resolve_session_key(
    session_key: Option<&str>,
    flight_number: Option<&str>,
    flight_date: Option<&str>,
) -> Result<SessionKey, ApiError> {
    match session_key {
        Some(raw) => parse_session_key(raw),
        None => {
            let (label, date) = require_flight(flight_number, flight_date)?;
            Ok(SessionKey::new(label.flight_number, date))
        }
    }
}

pub(crate) fn engine_error(err: EngineError) -> ApiError {
    match err {
        EngineError::SessionNotFound(key) => {
            ApiError::not_found(format!("Session not found: {key}. Please reinitialize."))
        }
        EngineError::RowNotFound(_) => ApiError::not_found(err.to_string()),
        other => ApiError::bad_request(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_key_accepts_flight_labels() {
        let key = parse_session_key("SQ 0024 (SIN → JFK)|2025-03-15").unwrap();
        assert_eq!(key.flight_number, "SQ 0024");
        assert_eq!(format_session_key(&key), "SQ 0024|2025-03-15");
        assert!(parse_session_key("SQ 0024").is_err());
        assert!(parse_session_key("SQ 0024|15/03/2025").is_err());
    }

    #[test]
    fn test_require_flight_needs_both() {
        assert!(require_flight(Some("SQ 0024"), None).is_err());
        assert!(require_flight(Some(" "), Some("2025-03-15")).is_err());
        let (label, date) = require_flight(Some("SQ 0024"), Some("2025-03-15")).unwrap();
        assert_eq!(label.flight_number, "SQ 0024");
        assert_eq!(date.to_string(), "2025-03-15");
    }

    #[test]
    fn test_engine_errors_map_to_status() {
        let api = engine_error(EngineError::SessionNotFound("SQ 0024 2025-03-15".into()));
        assert_eq!(api.status, axum::http::StatusCode::NOT_FOUND);
        let api = engine_error(EngineError::UnknownProtein("Tofu".into()));
        assert_eq!(api.status, axum::http::StatusCode::BAD_REQUEST);
    }
}
