//! Runtime configuration for Galley.
//!
//! Reads `galley.toml` from the current directory, or the path in the
//! `GALLEY_CONFIG` env var. Every section has defaults, so an absent default
//! file yields a usable configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{GalleyError, Result};

/// Complete service configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GalleyConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub data: DataConfig,

    /// Default signal importance, in percent
    #[serde(default)]
    pub weights: ImportanceWeights,

    #[serde(default)]
    pub cabin: CabinConfig,

    #[serde(default)]
    pub llm: LlmConfig,
}

// ── Server ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 8001 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port() }
    }
}

// ── Data sources ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory holding customers.csv, meal_df_new.csv and the four probability tables
    #[serde(default = "default_data_dir")]
    pub dir: PathBuf,

    /// Directory of `<ORIG>_<DEST>_PredictionResults.csv` reference files.
    /// Defaults to `<dir>/PredictionResults`.
    #[serde(default)]
    pub prediction_results_dir: Option<PathBuf>,

    /// Age bucket removed before cohort formation
    #[serde(default = "default_excluded_age_group")]
    pub excluded_age_group: String,
}

fn default_data_dir() -> PathBuf { PathBuf::from("data") }
fn default_excluded_age_group() -> String { "Under 2".to_string() }

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: default_data_dir(),
            prediction_results_dir: None,
            excluded_age_group: default_excluded_age_group(),
        }
    }
}

impl DataConfig {
    pub fn prediction_results_dir(&self) -> PathBuf {
        self.prediction_results_dir
            .clone()
            .unwrap_or_else(|| self.dir.join("PredictionResults"))
    }
}

// ── Importance weights ────────────────────────────────────────────────────────

/// Signal importance expressed as percentages (nominally summing to 100).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImportanceWeights {
    #[serde(default = "default_nationality_importance")]
    pub nationality_importance: f64,
    #[serde(default = "default_age_importance")]
    pub age_importance: f64,
    #[serde(default = "default_destination_importance")]
    pub destination_importance: f64,
    #[serde(default = "default_mealtime_importance")]
    pub mealtime_importance: f64,
}

fn default_nationality_importance() -> f64 { 40.0 }
fn default_age_importance() -> f64 { 20.0 }
fn default_destination_importance() -> f64 { 25.0 }
fn default_mealtime_importance() -> f64 { 15.0 }

/// Allowed distance of the percentage total from 100.
pub const WEIGHT_TOTAL_TOLERANCE: f64 = 0.1;

impl Default for ImportanceWeights {
    fn default() -> Self {
        Self {
            nationality_importance: default_nationality_importance(),
            age_importance: default_age_importance(),
            destination_importance: default_destination_importance(),
            mealtime_importance: default_mealtime_importance(),
        }
    }
}

impl ImportanceWeights {
    pub fn total(&self) -> f64 {
        self.nationality_importance
            + self.age_importance
            + self.destination_importance
            + self.mealtime_importance
    }

    /// Validate that every weight is a finite, non-negative percentage and
    /// that they total 100 (±0.1)
    pub fn validate(&self) -> bool {
        self.invalid_component().is_none() && self.totals_100()
    }

    pub fn totals_100(&self) -> bool {
        (self.total() - 100.0).abs() <= WEIGHT_TOTAL_TOLERANCE
    }

    /// First weight that is negative or not finite, by field name.
    pub fn invalid_component(&self) -> Option<(&'static str, f64)> {
        self.named()
            .into_iter()
            .find(|(_, w)| !w.is_finite() || *w < 0.0)
    }

    fn named(&self) -> [(&'static str, f64); 4] {
        [
            ("nationality_importance", self.nationality_importance),
            ("age_importance", self.age_importance),
            ("destination_importance", self.destination_importance),
            ("mealtime_importance", self.mealtime_importance),
        ]
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// Percentages divided by 100, in signal order
    /// (nationality, age, destination, meal time).
    pub fn as_fractions(&self) -> [f64; 4] {
        [
            self.nationality_importance / 100.0,
            self.age_importance / 100.0,
            self.destination_importance / 100.0,
            self.mealtime_importance / 100.0,
        ]
    }
}

// ── Cabin selection ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CabinPolicyKind {
    /// Per-segment exceptions in `route_overrides`, `primary` elsewhere
    #[default]
    RouteOverride,
    /// `primary` when anyone sits in it, else `fallback`
    PreferEconomy,
}

/// Which cabin's passengers feed a prediction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CabinConfig {
    #[serde(default)]
    pub policy: CabinPolicyKind,

    /// Segment → cabin exceptions used by `route_override`
    #[serde(default = "default_route_overrides")]
    pub route_overrides: BTreeMap<String, String>,

    #[serde(default = "default_primary_cabin")]
    pub primary: String,

    #[serde(default = "default_fallback_cabin")]
    pub fallback: String,
}

fn default_route_overrides() -> BTreeMap<String, String> {
    BTreeMap::from([("SIN JFK".to_string(), "S".to_string())])
}
fn default_primary_cabin() -> String { "Y".to_string() }
fn default_fallback_cabin() -> String { "S".to_string() }

impl Default for CabinConfig {
    fn default() -> Self {
        Self {
            policy: CabinPolicyKind::default(),
            route_overrides: default_route_overrides(),
            primary: default_primary_cabin(),
            fallback: default_fallback_cabin(),
        }
    }
}

// ── Summary LLM ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub enabled: bool,

    /// OpenAI-compatible chat completions base URL (without `/v1/chat/completions`)
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Env var holding the API token
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Send the token in this header instead of `Authorization: Bearer`
    #[serde(default)]
    pub token_header: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub temperature: f32,

    /// Cohorts listed in the summary prompt
    #[serde(default = "default_max_groups")]
    pub max_groups: usize,
}

fn default_llm_base_url() -> String { "http://localhost:11434".to_string() }
fn default_llm_model() -> String { "llama3:8b".to_string() }
fn default_token_env() -> String { "GALLEY_LLM_TOKEN".to_string() }
fn default_timeout_secs() -> u64 { 30 }
fn default_max_groups() -> usize { 10 }

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            token_env: default_token_env(),
            token_header: None,
            timeout_secs: default_timeout_secs(),
            temperature: 0.0,
            max_groups: default_max_groups(),
        }
    }
}

impl LlmConfig {
    /// Token read from the configured env var, if set and non-empty.
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env).ok().filter(|t| !t.trim().is_empty())
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

const DEFAULT_CONFIG_PATH: &str = "galley.toml";

impl GalleyConfig {
    /// Load configuration.
    /// Checks GALLEY_CONFIG env var first, then `galley.toml` in the current directory.
    pub fn load() -> Result<Self> {
        match std::env::var("GALLEY_CONFIG") {
            Ok(path) => {
                if !Path::new(&path).exists() {
                    return Err(GalleyError::Config(format!(
                        "Config file not found: {path} (from GALLEY_CONFIG)"
                    )));
                }
                Self::from_file(&path)
            }
            Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::from_file(DEFAULT_CONFIG_PATH),
            Err(_) => {
                tracing::warn!("{DEFAULT_CONFIG_PATH} not found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&content)?;
        tracing::info!(path = %path.as_ref().display(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        if let Some((name, value)) = config.weights.invalid_component() {
            return Err(GalleyError::Config(format!(
                "weights.{name} must be a non-negative number, got {value}"
            )));
        }
        if !config.weights.totals_100() {
            tracing::warn!(
                total = config.weights.total(),
                "Configured importance weights do not total 100; relative ratios still apply"
            );
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_weights_total_100() {
        let w = ImportanceWeights::default();
        assert!(w.validate());
        assert!(w.is_default());
        assert_eq!(w.as_fractions(), [0.40, 0.20, 0.25, 0.15]);
    }

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config = GalleyConfig::from_toml_str("").unwrap();
        assert_eq!(config.server.port, 8001);
        assert_eq!(config.cabin.policy, CabinPolicyKind::RouteOverride);
        assert_eq!(config.cabin.route_overrides.get("SIN JFK").map(String::as_str), Some("S"));
        assert_eq!(config.data.prediction_results_dir(), PathBuf::from("data/PredictionResults"));
        assert!(!config.llm.enabled);
    }

    #[test]
    fn test_partial_sections_keep_field_defaults() {
        let config = GalleyConfig::from_toml_str(
            r#"
            [weights]
            nationality_importance = 50.0
            age_importance = 10.0

            [llm]
            enabled = true
            token_header = "x-api-token"
            "#,
        )
        .unwrap();
        assert_eq!(config.weights.nationality_importance, 50.0);
        assert_eq!(config.weights.destination_importance, 25.0);
        assert!(config.weights.validate());
        assert!(config.llm.enabled);
        assert_eq!(config.llm.token_header.as_deref(), Some("x-api-token"));
        assert_eq!(config.llm.model, "llama3:8b");
    }

    #[test]
    fn test_mis_summed_weights_still_load() {
        let config = GalleyConfig::from_toml_str("[weights]\nnationality_importance = 90.0\n").unwrap();
        assert!(!config.weights.validate());
        assert_eq!(config.weights.invalid_component(), None);
    }

    #[test]
    fn test_negative_weight_rejected() {
        let w = ImportanceWeights {
            nationality_importance: -400.0,
            destination_importance: 500.0,
            age_importance: 0.0,
            mealtime_importance: 0.0,
        };
        assert!(w.totals_100());
        assert!(!w.validate());
        assert_eq!(w.invalid_component(), Some(("nationality_importance", -400.0)));

        let nan = ImportanceWeights { age_importance: f64::NAN, ..ImportanceWeights::default() };
        assert_eq!(nan.invalid_component().map(|(name, _)| name), Some("age_importance"));

        let err = GalleyConfig::from_toml_str("[weights]\nage_importance = -5.0\n").unwrap_err();
        assert!(matches!(err, GalleyError::Config(_)));
    }

    #[test]
    fn test_cabin_policy_is_typed() {
        let config = GalleyConfig::from_toml_str("[cabin]\npolicy = \"prefer_economy\"\n").unwrap();
        assert_eq!(config.cabin.policy, CabinPolicyKind::PreferEconomy);
        assert!(GalleyConfig::from_toml_str("[cabin]\npolicy = \"prefer_econmy\"\n").is_err());
    }
}
