//! galley-llm: summary writing through a chat-completions backend.
//!
//! A summary is decoration on top of a prediction: [`SummaryWriter`] turns
//! every backend failure into fixed fallback text so the caller never has to
//! handle one.

pub mod backend;
pub mod summary;

pub use backend::{
    ChatBackend, ChatMessage, Completion, CompletionRequest, LlmError, MockBackend, OpenAiCompatibleBackend, Role,
    TokenUsage,
};
pub use summary::{build_prompt, PassengerGroup, SummaryRequest, SummaryWriter, TopNationality, SUMMARY_UNAVAILABLE};
