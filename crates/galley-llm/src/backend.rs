//! Chat-completion backends used by the summary writer.
//!
//! [`ChatBackend`] is the seam: [`OpenAiCompatibleBackend`] talks to any
//! server exposing `/v1/chat/completions` (Ollama, LMStudio, vLLM, hosted
//! gateways), [`MockBackend`] answers from memory in tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use galley_common::LlmConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_MAX_TOKENS: u32 = 512;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request to summary backend failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("could not decode backend reply: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("summary backend unavailable: {0}")]
    Unavailable(String),
    #[error("summary backend answered {status}: {message}")]
    Status { status: u16, message: String },
    #[error("summary backend returned no text")]
    EmptyResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }
}

/// One chat turn. Unset fields fall back to the backend's defaults.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self { messages, ..Self::default() }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub model: String,
    pub usage: TokenUsage,
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, req: CompletionRequest) -> Result<Completion, LlmError>;

    /// Model name requests default to.
    fn model(&self) -> &str;
}

// ── Wire format ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatCompletionReply {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ReplyChoice>,
    #[serde(default)]
    usage: TokenUsage,
}

#[derive(Deserialize)]
struct ReplyChoice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Error bodies come as `{"error": {"message": ..}}` or `{"message": ..}`.
#[derive(Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: Option<ErrorDetail>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

impl ChatCompletionReply {
    fn into_completion(self, default_model: &str) -> Completion {
        let text = self
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        Completion {
            text,
            model: self.model.unwrap_or_else(|| default_model.to_string()),
            usage: self.usage,
        }
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|env| env.error.map(|e| e.message).or(env.message))
        .unwrap_or_else(|| body.trim().to_string())
}

// ── OpenAI-compatible ─────────────────────────────────────────────────────────

pub struct OpenAiCompatibleBackend {
    pub base_url: String,
    pub model: String,
    token: Option<String>,
    /// Header carrying the token; `None` means bearer auth
    token_header: Option<String>,
    http: reqwest::Client,
}

impl OpenAiCompatibleBackend {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, token: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            token,
            token_header: None,
            http: reqwest::Client::new(),
        }
    }

    /// Backend for the `[llm]` config section, token read from its env var.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            token: config.token(),
            token_header: config.token_header.clone(),
            http,
        })
    }

    pub fn with_token_header(mut self, header: impl Into<String>) -> Self {
        self.token_header = Some(header.into());
        self
    }

    fn url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let Some(token) = &self.token else {
            return builder;
        };
        match &self.token_header {
            Some(header) => builder.header(header.as_str(), token),
            None => builder.bearer_auth(token),
        }
    }
}

#[async_trait]
impl ChatBackend for OpenAiCompatibleBackend {
    async fn complete(&self, req: CompletionRequest) -> Result<Completion, LlmError> {
        let body = ChatCompletionBody {
            model: req.model.as_deref().unwrap_or(&self.model),
            messages: &req.messages,
            max_tokens: req.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: req.temperature.unwrap_or(0.0),
        };
        let resp = self.authorize(self.http.post(self.url())).json(&body).send().await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(LlmError::Status { status: status.as_u16(), message: error_message(&text) });
        }
        let reply: ChatCompletionReply = serde_json::from_str(&text)?;
        Ok(reply.into_completion(&self.model))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// ── Mock ──────────────────────────────────────────────────────────────────────

/// Replies with fixed text, or fails, and keeps every request it was sent.
pub struct MockBackend {
    reply: Option<String>,
    seen: Mutex<Vec<CompletionRequest>>,
}

impl MockBackend {
    pub fn replying(text: impl Into<String>) -> Self {
        Self { reply: Some(text.into()), seen: Mutex::default() }
    }

    pub fn failing() -> Self {
        Self { reply: None, seen: Mutex::default() }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.seen.lock().map(|seen| seen.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    async fn complete(&self, req: CompletionRequest) -> Result<Completion, LlmError> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(req);
        }
        let text = self
            .reply
            .clone()
            .ok_or_else(|| LlmError::Unavailable("mock backend set to fail".to_string()))?;
        Ok(Completion { text, model: "mock".to_string(), usage: TokenUsage::default() })
    }

    fn model(&self) -> &str {
        "mock"
    }
}
