//! Criteria scoring pipeline.
//!
//! task documents → text extraction → criteria exemplar → prompt → LLM →
//! lenient JSON parse of the completion.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{json, Value};
use thiserror::Error;

use crate::config::ProviderConfig;
use crate::criteria::{load_criteria, CriteriaError};
use crate::extract::{extract_task, ExtractError};
use crate::llm::{ChatOptions, LlmClient, LlmError};
use crate::prompt::build_prompt;
use crate::store::TaskStore;

/// Key under which a non-JSON completion is returned.
pub const RAW_RESPONSE_KEY: &str = "raw_response";

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Criteria(#[from] CriteriaError),

    #[error(transparent)]
    Llm(#[from] LlmError),
}

/// Runs criteria queries against one LLM provider.
pub struct CriteriaScorer {
    llm: Arc<dyn LlmClient>,
    model: String,
    options: ChatOptions,
    criteria_template: PathBuf,
}

impl CriteriaScorer {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        model: impl Into<String>,
        options: ChatOptions,
        criteria_template: impl Into<PathBuf>,
    ) -> Self {
        Self {
            llm,
            model: model.into(),
            options,
            criteria_template: criteria_template.into(),
        }
    }

    /// Build a scorer using the model and sampling settings of `provider`.
    pub fn from_config(
        llm: Arc<dyn LlmClient>,
        provider: &ProviderConfig,
        criteria_template: impl Into<PathBuf>,
    ) -> Self {
        let options = ChatOptions {
            temperature: Some(provider.temperature),
            max_tokens: Some(provider.max_tokens),
            ..ChatOptions::default()
        };
        Self::new(llm, provider.model.clone(), options, criteria_template)
    }

    pub fn is_configured(&self) -> bool {
        self.llm.is_configured()
    }

    /// Score the documents of `task_id` against the criteria exemplar.
    ///
    /// The credential is checked first so a misconfigured service fails before
    /// any document is parsed.
    pub async fn score(
        &self,
        store: &dyn TaskStore,
        task_id: &str,
    ) -> Result<Value, ScoringError> {
        if !self.llm.is_configured() {
            return Err(LlmError::missing_credential(self.llm.provider()).into());
        }

        let text = extract_task(store, task_id).await?;
        let criteria = load_criteria(&self.criteria_template).await?;
        let prompt = build_prompt(&text, &criteria);
        tracing::info!(
            "Scoring task {} with {} ({} prompt chars)",
            task_id,
            self.model,
            prompt.chars().count()
        );

        let completion = self
            .llm
            .complete(&self.model, &prompt, self.options.clone())
            .await?;
        Ok(parse_completion(&completion))
    }
}

/// Parse a completion as JSON, falling back to `{"raw_response": text}`.
///
/// A completion wrapped in a Markdown code fence is unwrapped first.
pub fn parse_completion(text: &str) -> Value {
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return value;
    }
    if let Some(inner) = strip_code_fence(text) {
        if let Ok(value) = serde_json::from_str::<Value>(inner) {
            return value;
        }
    }
    tracing::debug!("Completion is not JSON, returning it raw");
    json!({ RAW_RESPONSE_KEY: text })
}

fn strip_code_fence(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    let rest = trimmed.strip_prefix("```")?;
    // Drop the info string ("json") up to the first newline.
    let body = &rest[rest.find('\n')? + 1..];
    let body = body.trim_end().strip_suffix("```")?;
    Some(body.trim())
}
