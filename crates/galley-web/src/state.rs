//! Shared application state for the web server.

use std::sync::Arc;

use anyhow::Context;
use galley_common::GalleyConfig;
use galley_data::DataStore;
use galley_engine::SessionStore;
use galley_llm::SummaryWriter;

/// Shared state injected into every Axum handler.
pub struct AppState {
    pub config: GalleyConfig,
    /// Read-only after start
    pub data: Arc<DataStore>,
    /// Probability overrides per flight and date
    pub sessions: SessionStore,
    pub summarizer: SummaryWriter,
}

impl AppState {
    pub fn new(config: GalleyConfig, data: DataStore, summarizer: SummaryWriter) -> Self {
        Self { config, data: Arc::new(data), sessions: SessionStore::new(), summarizer }
    }

    /// Load the data directory and the summary backend named in `config`.
    pub fn load(config: GalleyConfig) -> anyhow::Result<Self> {
        let data = DataStore::load(&config.data, &config.cabin)?;
        let summarizer = SummaryWriter::from_config(&config.llm).context("Invalid [llm] configuration")?;
        Ok(Self::new(config, data, summarizer))
    }
}

pub type SharedState = Arc<AppState>;
