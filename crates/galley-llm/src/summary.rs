//! Executive summaries of a meal prediction.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::sync::Arc;

use galley_common::LlmConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backend::{ChatBackend, ChatMessage, CompletionRequest, LlmError, OpenAiCompatibleBackend};

/// Text used whenever a summary cannot be produced.
pub const SUMMARY_UNAVAILABLE: &str = "AI summary not available due to an error.";

const SYSTEM_PROMPT: &str = "You are a strategic advisor for airline meal planning. \
Write clear, simple explanations in plain English for business users. \
Write exactly 2 paragraphs without bullet points.";

/// One passenger group as shown to the summary writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassengerGroup {
    pub nationality: String,
    pub age_group: String,
    pub destination: String,
    pub meal_time: String,
    #[serde(default)]
    pub weekday: String,
    pub count: u32,
    /// Final blended distribution, protein → probability
    pub probabilities: BTreeMap<String, f64>,
    /// Per-signal restricted distributions
    #[serde(default)]
    pub metric_probabilities: BTreeMap<String, BTreeMap<String, f64>>,
    /// Per-signal free-text notes from the probability tables
    #[serde(default)]
    pub reasoning: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopNationality {
    pub nationality_code: String,
    pub count: u32,
    pub percentage: f64,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub sources: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRequest {
    pub flight_number: String,
    pub flight_date: String,
    pub passenger_groups: Vec<PassengerGroup>,
    /// Importance weights in percent, keyed like `nationality_importance`
    pub weights: BTreeMap<String, f64>,
    /// Predicted meal counts per protein
    pub prediction_results: BTreeMap<String, f64>,
    #[serde(default)]
    pub original_counts: BTreeMap<String, f64>,
    #[serde(default)]
    pub top_nationalities: Vec<TopNationality>,
}

fn clean(s: &str) -> String {
    s.replace(['"', '\''], "")
}

fn title_case(key: &str) -> String {
    key.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// User prompt for one summary. At most `max_groups` groups are listed,
/// largest first.
pub fn build_prompt(req: &SummaryRequest, max_groups: usize) -> String {
    let total: u32 = req.passenger_groups.iter().map(|g| g.count).sum();
    let mut out = String::new();

    let _ = writeln!(out, "You are explaining meal predictions for flight {} on {}.", clean(&req.flight_number), req.flight_date);
    let _ = writeln!(out, "\nTOTAL PASSENGERS: {total}");

    if !req.weights.is_empty() {
        let _ = writeln!(out, "\nFEATURE WEIGHTS:");
        for (name, value) in &req.weights {
            let _ = writeln!(out, "- {}: {value}%", title_case(name));
        }
    }

    if !req.top_nationalities.is_empty() {
        let _ = writeln!(out, "\nTOP NATIONALITIES ON THIS FLIGHT:");
        for nat in req.top_nationalities.iter().take(5) {
            let _ = writeln!(out, "- {}: {} passengers ({:.1}%)", nat.nationality_code, nat.count, nat.percentage);
            if !nat.reasoning.trim().is_empty() {
                let _ = writeln!(out, "  Cultural insight: {}", nat.reasoning.trim());
            }
            if !nat.sources.trim().is_empty() {
                let _ = writeln!(out, "  Source: {}", nat.sources.trim());
            }
        }
    }

    let _ = writeln!(out, "\nMEAL CHANGES:");
    let proteins: BTreeSet<&String> = req.original_counts.keys().chain(req.prediction_results.keys()).collect();
    for protein in proteins {
        let old = req.original_counts.get(protein).copied().unwrap_or(0.0);
        let new = req.prediction_results.get(protein).copied().unwrap_or(0.0);
        let change = new - old;
        let pct = if old > 0.0 { change / old * 100.0 } else { 0.0 };
        let _ = writeln!(out, "- {protein}: {old:.0} → {new:.0} ({change:+.0}, {pct:+.1}%)");
    }

    let mut groups: Vec<&PassengerGroup> = req.passenger_groups.iter().collect();
    groups.sort_by(|a, b| b.count.cmp(&a.count));
    let _ = writeln!(out, "\nTOP PASSENGER GROUPS:");
    for group in groups.into_iter().take(max_groups) {
        let _ = writeln!(out, "\nPassenger group: {} passengers", group.count);
        let _ = writeln!(
            out,
            "- Profile: Nationality={}, Age Group={}, Destination={}, Meal Time={}, Weekday={}",
            clean(&group.nationality),
            clean(&group.age_group),
            clean(&group.destination),
            clean(&group.meal_time),
            clean(&group.weekday),
        );
        let probs: Vec<String> = group
            .probabilities
            .iter()
            .map(|(p, v)| format!("{p}: {:.1}%", v * 100.0))
            .collect();
        let _ = writeln!(out, "- Final weighted probabilities: {}", probs.join(", "));
        let notes: Vec<String> = group
            .reasoning
            .iter()
            .filter(|(_, r)| !r.trim().is_empty())
            .map(|(feature, r)| format!("  * {}: {}", title_case(feature), r.trim()))
            .collect();
        if !notes.is_empty() {
            let _ = writeln!(out, "- Cultural/behavioral insights:\n{}", notes.join("\n"));
        }
    }

    out.push_str(
        "\nTASK:\nWrite a short executive summary explaining why these meal quantities are recommended. \
Write exactly 2 paragraphs of 30-50 words each. Describe passengers naturally, do not repeat the \
final counts, and only use the numbers given above.\n",
    );
    out
}

/// Writes summaries through an optional backend. Without one, or when the
/// backend fails, the result is [`SUMMARY_UNAVAILABLE`].
#[derive(Clone)]
pub struct SummaryWriter {
    backend: Option<Arc<dyn ChatBackend>>,
    max_groups: usize,
    temperature: f32,
}

impl SummaryWriter {
    pub fn new(backend: Arc<dyn ChatBackend>, max_groups: usize) -> Self {
        Self { backend: Some(backend), max_groups, temperature: 0.0 }
    }

    pub fn disabled() -> Self {
        Self { backend: None, max_groups: 0, temperature: 0.0 }
    }

    /// Writer for the `[llm]` section; disabled unless `enabled = true`.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        if !config.enabled {
            return Ok(Self::disabled());
        }
        let backend = OpenAiCompatibleBackend::from_config(config)?;
        info!(model = %backend.model, url = %backend.base_url, "Summary backend configured");
        Ok(Self {
            backend: Some(Arc::new(backend)),
            max_groups: config.max_groups,
            temperature: config.temperature,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    pub async fn try_summarize(&self, req: &SummaryRequest) -> Result<String, LlmError> {
        let backend = self
            .backend
            .as_ref()
            .ok_or_else(|| LlmError::Unavailable("summaries are disabled".to_string()))?;
        let prompt = build_prompt(req, self.max_groups);
        debug!(chars = prompt.len(), "Summary prompt built");

        let resp = backend
            .complete(
                CompletionRequest::new(vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)])
                    .temperature(self.temperature),
            )
            .await?;
        let text = resp.text.trim();
        if text.is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(text.to_string())
    }

    /// Never fails; errors are logged and replaced by fallback text.
    pub async fn summarize(&self, req: &SummaryRequest) -> String {
        match self.try_summarize(req).await {
            Ok(text) => text,
            Err(e) => {
                warn!(flight = %req.flight_number, date = %req.flight_date, "Summary failed: {e}");
                SUMMARY_UNAVAILABLE.to_string()
            }
        }
    }
}
