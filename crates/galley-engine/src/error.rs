//! Engine error types.
//!
//! Missing signal data, empty protein sets and malformed records are not
//! errors; they are counted in [`crate::predict::Diagnostics`]. What remains
//! here are precondition violations and session bookkeeping failures.

use thiserror::Error;

use crate::protein::Protein;
use crate::signal::{Signal, SignalKey};

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Unknown protein: {0}")]
    UnknownProtein(String),

    #[error("Invalid probability for {protein}: {value} (must be finite and non-negative)")]
    InvalidProbability { protein: Protein, value: f64 },

    #[error("Key {key} does not belong to the {expected} table")]
    SignalMismatch { expected: Signal, key: SignalKey },

    #[error("Probability row not in session: {0}")]
    RowNotFound(SignalKey),

    #[error("Protein {protein} is not available for {key}")]
    ProteinNotAvailable { key: SignalKey, protein: Protein },

    #[error("Session not found: {0}")]
    SessionNotFound(String),
}
