//! OpenAI-compatible chat-completions client with a bounded retry for
//! transient errors.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::error::{classify_http_status, redact_secret, LlmError, LlmErrorKind, RetryConfig};
use super::{ChatMessage, ChatOptions, ChatResponse, LlmClient};
use crate::config::ProviderConfig;

/// Chat-completions client for one provider endpoint.
pub struct ChatCompletionsClient {
    client: Client,
    provider: String,
    api_url: String,
    api_key: Option<SecretString>,
    retry_config: RetryConfig,
}

impl ChatCompletionsClient {
    /// Create a client with an explicit request timeout.
    pub fn new(
        provider: impl Into<String>,
        api_url: impl Into<String>,
        api_key: Option<SecretString>,
        timeout: Duration,
        retry_config: RetryConfig,
    ) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            provider: provider.into(),
            api_url: api_url.into(),
            api_key,
            retry_config,
        })
    }

    /// Create a client from provider settings.
    pub fn from_config(provider: &str, config: &ProviderConfig) -> reqwest::Result<Self> {
        let retry_config = RetryConfig {
            max_retries: config.max_retries,
            ..RetryConfig::default()
        };
        Self::new(
            provider,
            config.api_url.clone(),
            config.api_key.clone(),
            config.timeout,
            retry_config,
        )
    }

    /// Parse Retry-After header if present.
    fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
        headers
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }

    /// Create an LlmError from HTTP response status and (redacted) body.
    fn create_error(
        &self,
        status: reqwest::StatusCode,
        body: &str,
        retry_after: Option<Duration>,
    ) -> LlmError {
        let status_code = status.as_u16();
        let body = body.to_string();

        match classify_http_status(status_code) {
            LlmErrorKind::RateLimited => LlmError::rate_limited(&self.provider, body, retry_after),
            LlmErrorKind::ClientError => LlmError::client_error(&self.provider, status_code, body),
            _ => LlmError::server_error(&self.provider, status_code, body),
        }
    }

    /// Execute a single request without retry.
    async fn execute_request(
        &self,
        api_key: &SecretString,
        request: &CompletionRequest,
    ) -> Result<ChatResponse, LlmError> {
        let secret = api_key.expose_secret();
        let response = match self
            .client
            .post(&self.api_url)
            .bearer_auth(secret)
            .json(request)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                let message = if e.is_timeout() {
                    format!("Request timeout: {}", e)
                } else if e.is_connect() {
                    format!("Connection failed: {}", e)
                } else {
                    format!("Request failed: {}", e)
                };
                return Err(LlmError::network_error(
                    &self.provider,
                    redact_secret(&message, secret),
                ));
            }
        };

        let status = response.status();
        let retry_after = Self::parse_retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();
        let body = redact_secret(&body, secret);

        if !status.is_success() {
            return Err(self.create_error(status, &body, retry_after));
        }

        let parsed: CompletionResponse = serde_json::from_str(&body).map_err(|e| {
            LlmError::parse_error(
                &self.provider,
                format!("Failed to parse response: {}, body: {}", e, body),
            )
        })?;

        let choice = parsed.choices.into_iter().next().ok_or_else(|| {
            LlmError::parse_error(&self.provider, "No choices in response".to_string())
        })?;

        Ok(ChatResponse {
            content: choice.message.content,
        })
    }

    /// Execute a request, retrying transient failures within the retry budget.
    async fn execute_with_retry(
        &self,
        api_key: &SecretString,
        request: &CompletionRequest,
    ) -> Result<ChatResponse, LlmError> {
        let start = Instant::now();
        let mut attempt = 0;

        loop {
            match self.execute_request(api_key, request).await {
                Ok(response) => {
                    if attempt > 0 {
                        tracing::info!(
                            "{} request succeeded after {} retries (total time: {:?})",
                            self.provider,
                            attempt,
                            start.elapsed()
                        );
                    }
                    return Ok(response);
                }
                Err(error) => {
                    let should_retry = self.retry_config.should_retry(&error)
                        && attempt < self.retry_config.max_retries;

                    if !should_retry {
                        if attempt > 0 {
                            tracing::error!(
                                "{} request failed after {} retries (total time: {:?}): {}",
                                self.provider,
                                attempt,
                                start.elapsed(),
                                error
                            );
                        } else {
                            tracing::error!("{} request failed: {}", self.provider, error);
                        }
                        return Err(error);
                    }

                    let remaining = self
                        .retry_config
                        .max_retry_duration
                        .saturating_sub(start.elapsed());
                    let delay = error.suggested_delay(attempt).min(remaining);
                    if delay.is_zero() {
                        tracing::warn!(
                            "{} retry budget exhausted after attempt {}: {}",
                            self.provider,
                            attempt + 1,
                            error
                        );
                        return Err(error);
                    }

                    tracing::warn!(
                        "{} attempt {} failed with {}, retrying in {:?}",
                        self.provider,
                        attempt + 1,
                        error.kind,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[async_trait]
impl LlmClient for ChatCompletionsClient {
    fn provider(&self) -> &str {
        &self.provider
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: ChatOptions,
    ) -> Result<ChatResponse, LlmError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| LlmError::missing_credential(&self.provider))?;

        let request = CompletionRequest {
            model: model.to_string(),
            messages: messages.to_vec(),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        tracing::debug!("Sending request to {}: model={}", self.provider, model);

        self.execute_with_retry(api_key, &request).await
    }
}

/// Chat-completions request body.
#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}
