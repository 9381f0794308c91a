//! OpenAI chat completions client (POST {base}/chat/completions).
//!
//! Each call sends exactly one user message: no system preamble, no history.

use crate::config::CompletionSettings;
use crate::llm::{CompletionBackend, LlmError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Client for an OpenAI-compatible chat completions endpoint. Cheap to clone; the inner
/// reqwest client is shared.
#[derive(Clone)]
pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(settings: &CompletionSettings) -> Self {
        Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            client: reqwest::Client::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// POST /chat/completions with a single user message. Logs the input before the call and the
    /// full response body after it.
    pub async fn create_completion(&self, user_text: &str) -> Result<ChatCompletion, LlmError> {
        if user_text.trim().is_empty() {
            return Err(LlmError::EmptyInput);
        }
        log::info!("user input: {}", user_text);

        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![RequestMessage {
                role: "user",
                content: user_text,
            }],
        };
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let status = res.status();
        let text = res.text().await?;
        if !status.is_success() {
            return Err(LlmError::Api {
                status: status.as_u16(),
                body: text,
            });
        }
        log::info!("completion response: {}", text);
        serde_json::from_str(&text).map_err(|e| LlmError::Decode(e.to_string()))
    }
}

#[async_trait]
impl CompletionBackend for OpenAiClient {
    async fn complete(&self, user_text: &str) -> Result<String, LlmError> {
        let completion = self.create_completion(user_text).await?;
        completion.reply_text()
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<RequestMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// Decoded chat completion. Only the fields the relay reads are modelled.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletion {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: Option<ResponseMessage>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletion {
    /// Content of the first choice, trimmed. A response without a first choice or without content
    /// is a failure, not an empty reply.
    pub fn reply_text(&self) -> Result<String, LlmError> {
        let choice = self.choices.first().ok_or(LlmError::NoChoices)?;
        let content = choice
            .message
            .as_ref()
            .and_then(|m| m.content.as_deref())
            .ok_or_else(|| LlmError::Decode("first choice has no message content".to_string()))?;
        Ok(content.trim().to_string())
    }
}
