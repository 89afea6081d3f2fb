//! Service configuration.
//!
//! Values are read once from the process environment (after an optional `.env`
//! file has been loaded) and then passed explicitly to the task store and the
//! LLM gateways. Missing provider credentials are not a startup error; they are
//! reported when the corresponding endpoint is called.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

pub const MISTRAL_API_URL: &str = "https://api.mistral.ai/v1/chat/completions";
pub const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

pub const DEFAULT_SCORING_MODEL: &str = "mistral-large-latest";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },
}

/// Settings for one upstream chat-completions provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_url: String,
    /// Bearer credential; `None` when the variable is unset or empty.
    pub api_key: Option<SecretString>,
    pub model: String,
    pub max_tokens: u64,
    pub temperature: f64,
    pub timeout: Duration,
    /// Extra attempts after the first one for transient failures.
    pub max_retries: u32,
}

impl ProviderConfig {
    /// Mistral settings used for criteria scoring.
    pub fn mistral(api_key: Option<SecretString>) -> Self {
        Self {
            api_url: MISTRAL_API_URL.to_string(),
            api_key,
            model: DEFAULT_SCORING_MODEL.to_string(),
            max_tokens: 1500,
            temperature: 0.7,
            timeout: Duration::from_secs(120),
            max_retries: 1,
        }
    }

    /// OpenAI settings used for the generic chat endpoint.
    pub fn openai(api_key: Option<SecretString>) -> Self {
        Self {
            api_url: OPENAI_API_URL.to_string(),
            api_key,
            model: DEFAULT_CHAT_MODEL.to_string(),
            max_tokens: 1000,
            temperature: 0.7,
            timeout: Duration::from_secs(120),
            max_retries: 0,
        }
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Top-level service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Root under which each task gets its own directory.
    pub data_dir: PathBuf,
    /// Criteria exemplar JSON, read on every query.
    pub criteria_template: PathBuf,
    pub cors_origins: Vec<String>,
    pub max_upload_bytes: usize,
    pub scoring: ProviderConfig,
    pub chat: ProviderConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8001,
            data_dir: PathBuf::from("temp"),
            criteria_template: PathBuf::from("template").join("example.json"),
            cors_origins: vec!["http://localhost:3000".to_string()],
            max_upload_bytes: 100 * 1024 * 1024,
            scoring: ProviderConfig::mistral(None),
            chat: ProviderConfig::openai(None),
        }
    }
}

impl Config {
    /// Build the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Config::default();

        if let Some(host) = var("HOST") {
            config.host = host;
        }
        if let Some(port) = var("PORT") {
            config.port = parse_var("PORT", &port)?;
        }
        if let Some(dir) = var("TENDER_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(path) = var("CRITERIA_TEMPLATE") {
            config.criteria_template = PathBuf::from(path);
        }
        if let Some(origins) = var("CORS_ORIGINS") {
            config.cors_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        if let Some(mb) = var("MAX_UPLOAD_MB") {
            let mb: usize = parse_var("MAX_UPLOAD_MB", &mb)?;
            config.max_upload_bytes = mb * 1024 * 1024;
        }

        config.scoring.api_key = var("MISTRAL_API_KEY").map(SecretString::from);
        if let Some(url) = var("MISTRAL_API_URL") {
            config.scoring.api_url = url;
        }
        if let Some(model) = var("MISTRAL_MODEL") {
            config.scoring.model = model;
        }

        config.chat.api_key = var("GPT_API_KEY").map(SecretString::from);
        if let Some(url) = var("OPENAI_API_URL") {
            config.chat.api_url = url;
        }
        if let Some(model) = var("CHAT_DEFAULT_MODEL") {
            config.chat.model = model;
        }

        if let Some(secs) = var("LLM_TIMEOUT_SECS") {
            let timeout = Duration::from_secs(parse_var("LLM_TIMEOUT_SECS", &secs)?);
            config.scoring.timeout = timeout;
            config.chat.timeout = timeout;
        }

        Ok(config)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        var,
        value: value.to_string(),
    })
}
