//! LLM client module.
//!
//! Both upstream providers (Mistral for criteria scoring, OpenAI for the
//! generic chat endpoint) speak the OpenAI chat-completions dialect, so a
//! single [`ChatCompletionsClient`] serves both behind the [`LlmClient`] trait.
//! Handlers only see the trait, which lets tests substitute a stub.

mod chat_completions;
mod error;

pub use chat_completions::ChatCompletionsClient;
pub use error::{classify_http_status, redact_secret, LlmError, LlmErrorKind, RetryConfig};

use async_trait::async_trait;
use serde::Serialize;

/// A message in a chat conversation.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage {
            role: "user",
            content: content.into(),
        }
    }
}

/// First choice of a chat completion.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: Option<String>,
}

/// Optional sampling parameters for chat completions.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub temperature: Option<f64>,
    pub max_tokens: Option<u64>,
}

/// Trait for LLM clients.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Name used in logs and error messages ("Mistral", "OpenAI").
    fn provider(&self) -> &str;

    /// Whether a credential is available. Calls fail fast without one.
    fn is_configured(&self) -> bool;

    /// Send a chat completion request.
    async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: ChatOptions,
    ) -> Result<ChatResponse, LlmError>;

    /// Send a single user message and return the first completion's text.
    async fn complete(
        &self,
        model: &str,
        prompt: &str,
        options: ChatOptions,
    ) -> Result<String, LlmError> {
        let response = self
            .chat_completion(model, &[ChatMessage::user(prompt)], options)
            .await?;
        response.content.ok_or_else(|| {
            LlmError::parse_error(self.provider(), "Completion has no message content".to_string())
        })
    }
}
