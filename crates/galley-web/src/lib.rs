//! galley-web: HTTP API for meal predictions.
//! Provides:
//!   - Flight listing, customer summaries and catalog meals
//!   - Probability tables and per-session overrides
//!   - Predictions with per-cohort breakdowns and summaries
//!   - Metric validation

pub mod router;
pub mod handlers;
pub mod state;
