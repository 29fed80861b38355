//! galley-common: Shared errors and configuration used across all Galley crates.

pub mod error;
pub mod config;

// Re-export commonly used types
pub use config::{GalleyConfig, ImportanceWeights, CabinConfig, CabinPolicyKind, LlmConfig};
pub use error::{GalleyError, ApiError};
