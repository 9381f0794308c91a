//! LLM abstraction and OpenAI-compatible completion client.
//!
//! The relay needs exactly one operation from a provider: turn a single user utterance into
//! one assistant reply. [`CompletionBackend`] is that seam; handlers hold it as a trait object so
//! tests can swap in scripted backends.

mod openai;

use async_trait::async_trait;

pub use openai::{ChatCompletion, OpenAiClient};

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("completion request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("completion api error: {status} {body}")]
    Api { status: u16, body: String },
    #[error("completion response could not be decoded: {0}")]
    Decode(String),
    #[error("completion response contained no choices")]
    NoChoices,
    #[error("refusing to send empty input to the completion api")]
    EmptyInput,
}

/// One-shot completion: a single user message in, the first choice's trimmed content out.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, user_text: &str) -> Result<String, LlmError>;
}
