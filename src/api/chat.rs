//! Generic chat endpoint proxied to the chat provider.

use std::sync::Arc;

use axum::{extract::rejection::JsonRejection, extract::State, Json};

use super::error::ApiError;
use super::routes::AppState;
use super::types::{ChatReply, ChatRequest};
use crate::llm::{ChatOptions, LlmErrorKind};

/// POST /chat - Send one message and return the first completion.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>, ApiError> {
    let Json(req) = payload?;
    let settings = &state.config.chat;
    let model = req
        .model
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| settings.model.clone());
    let options = ChatOptions {
        temperature: Some(settings.temperature),
        max_tokens: Some(settings.max_tokens),
        ..ChatOptions::default()
    };

    match state.chat.complete(&model, &req.message, options).await {
        Ok(response) => Ok(Json(ChatReply { response })),
        Err(e) if e.kind == LlmErrorKind::MissingCredential => Err(e.into()),
        Err(e) => Err(ApiError::Upstream(format!("Error processing request: {}", e))),
    }
}
