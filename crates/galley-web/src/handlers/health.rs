//! Liveness and static UI data.

use axum::{response::IntoResponse, Json};
use serde_json::json;

/// Steps shown while a prediction runs.
pub const WORKFLOW_STEPS: [&str; 7] = [
    "Loading passenger booking data...",
    "Analyzing nationality distribution...",
    "Processing age demographics...",
    "Evaluating destination preferences...",
    "Calculating meal time factors...",
    "Allocating meals per protein...",
    "Generating recommendations...",
];

/// GET /
pub async fn root() -> impl IntoResponse {
    Json(json!({ "message": "Airline Meal Prediction API", "status": "running" }))
}

/// GET /api/workflow-steps
pub async fn workflow_steps() -> impl IntoResponse {
    Json(json!({ "steps": WORKFLOW_STEPS }))
}
