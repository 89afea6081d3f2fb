//! Error taxonomy and retry policy for upstream LLM calls.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Broad category of an upstream failure, used to decide on retries and on
/// the HTTP status reported to our own callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// No credential configured for the provider.
    MissingCredential,
    /// 429 Too Many Requests.
    RateLimited,
    /// 5xx from the provider.
    ServerError,
    /// Other 4xx from the provider.
    ClientError,
    /// Timeout, connection refused, TLS failure...
    Network,
    /// Success status but an unusable body.
    Parse,
}

impl fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::MissingCredential => "missing credential",
            Self::RateLimited => "rate limited",
            Self::ServerError => "server error",
            Self::ClientError => "client error",
            Self::Network => "network error",
            Self::Parse => "parse error",
        };
        f.write_str(s)
    }
}

/// Map an HTTP status code to an error kind.
pub fn classify_http_status(status: u16) -> LlmErrorKind {
    match status {
        429 => LlmErrorKind::RateLimited,
        500..=599 => LlmErrorKind::ServerError,
        400..=499 => LlmErrorKind::ClientError,
        _ => LlmErrorKind::ServerError,
    }
}

/// An upstream failure. `message` carries the upstream body for HTTP errors,
/// with the credential already redacted.
#[derive(Debug, Clone, Error)]
#[error("{provider} API error ({kind}{}): {message}", status_suffix(.status_code))]
pub struct LlmError {
    pub provider: String,
    pub kind: LlmErrorKind,
    pub status_code: Option<u16>,
    pub message: String,
    pub retry_after: Option<Duration>,
}

fn status_suffix(status_code: &Option<u16>) -> String {
    status_code
        .map(|s| format!(", status {}", s))
        .unwrap_or_default()
}

impl LlmError {
    fn new(provider: &str, kind: LlmErrorKind, message: String) -> Self {
        Self {
            provider: provider.to_string(),
            kind,
            status_code: None,
            message,
            retry_after: None,
        }
    }

    pub fn missing_credential(provider: &str) -> Self {
        Self::new(
            provider,
            LlmErrorKind::MissingCredential,
            format!("{} API key not configured", provider),
        )
    }

    pub fn rate_limited(provider: &str, message: String, retry_after: Option<Duration>) -> Self {
        Self {
            status_code: Some(429),
            retry_after,
            ..Self::new(provider, LlmErrorKind::RateLimited, message)
        }
    }

    pub fn server_error(provider: &str, status_code: u16, message: String) -> Self {
        Self {
            status_code: Some(status_code),
            ..Self::new(provider, LlmErrorKind::ServerError, message)
        }
    }

    pub fn client_error(provider: &str, status_code: u16, message: String) -> Self {
        Self {
            status_code: Some(status_code),
            ..Self::new(provider, LlmErrorKind::ClientError, message)
        }
    }

    pub fn network_error(provider: &str, message: String) -> Self {
        Self::new(provider, LlmErrorKind::Network, message)
    }

    pub fn parse_error(provider: &str, message: String) -> Self {
        Self::new(provider, LlmErrorKind::Parse, message)
    }

    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            LlmErrorKind::RateLimited | LlmErrorKind::ServerError | LlmErrorKind::Network
        )
    }

    /// Delay before the next attempt: `Retry-After` when given, otherwise
    /// exponential backoff from one second.
    pub fn suggested_delay(&self, attempt: u32) -> Duration {
        if let Some(delay) = self.retry_after {
            return delay;
        }
        Duration::from_secs(1u64 << attempt.min(5))
    }
}

/// Bounded retry policy.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    /// Upper bound on the total time spent retrying.
    pub max_retry_duration: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            max_retry_duration: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn should_retry(&self, error: &LlmError) -> bool {
        self.max_retries > 0 && error.is_transient()
    }
}

/// Replace every occurrence of `secret` in `text`.
pub fn redact_secret(text: &str, secret: &str) -> String {
    if secret.is_empty() {
        return text.to_string();
    }
    text.replace(secret, "[REDACTED]")
}
