//! Axum router: maps all URL paths to handlers.

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::CorsLayer,
    trace::TraceLayer,
    compression::CompressionLayer,
};
use std::sync::Arc;
use crate::state::{AppState, SharedState};
use crate::handlers::{
    health::{root, workflow_steps},
    flights::{api_flights, api_customer_summary, api_available_meals},
    metrics::{api_master_metrics, api_validate_metrics},
    session::{initialize_session, update_session_probability, get_modified_rows, clear_session},
    predict::api_predict,
    summary::api_ai_summary,
};

/// Build and return the full Axum router.
pub fn build_router(state: AppState) -> Router {
    let shared: SharedState = Arc::new(state);

    Router::new()
        .route("/",                       get(root))
        .route("/api/workflow-steps",     get(workflow_steps))

        // Flights
        .route("/api/flights",            get(api_flights))
        .route("/api/customer-summary",   get(api_customer_summary))
        .route("/api/available-meals",    get(api_available_meals))

        // Probability tables
        .route("/api/master-metrics",     get(api_master_metrics))
        .route("/api/validate-metrics",   post(api_validate_metrics))

        // Sessions
        .route("/api/initialize-session",          post(initialize_session))
        .route("/api/update-session-probability",  post(update_session_probability))
        .route("/api/get-modified-rows",           get(get_modified_rows))
        .route("/api/clear-session",               post(clear_session))

        // Predictions
        .route("/api/predict",            post(api_predict))
        .route("/api/ai-summary",         post(api_ai_summary))

        // Middleware
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}
