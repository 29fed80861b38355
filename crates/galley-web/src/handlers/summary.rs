//! Stand-alone summary requests.

use axum::{extract::State, response::IntoResponse, Json};
use galley_llm::SummaryRequest;
use serde_json::json;

use crate::state::SharedState;

/// POST /api/ai-summary
///
/// Always answers 200; a failed or disabled backend yields the fallback text.
pub async fn api_ai_summary(
    State(state): State<SharedState>,
    Json(req): Json<SummaryRequest>,
) -> impl IntoResponse {
    let summary = state.summarizer.summarize(&req).await;
    Json(json!({ "summary": summary }))
}
