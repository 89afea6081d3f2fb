//! HTTP error mapping.
//!
//! Every failure reaches the client as `{"detail": "..."}` with 400 for
//! malformed input, 404 for unknown tasks and 500 for everything else.

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use super::types::ErrorResponse;
use crate::extract::ExtractError;
use crate::llm::{LlmError, LlmErrorKind};
use crate::scoring::ScoringError;
use crate::store::StoreError;

pub const NO_DOCUMENTS: &str = "No documents found for this task_id";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// Missing or invalid service configuration (e.g. no credential).
    #[error("{0}")]
    Configuration(String),

    /// Upstream provider failure; the detail carries the upstream body.
    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Configuration(_) | Self::Upstream(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed ({}): {}", status, self);
        } else {
            tracing::debug!("Request rejected ({}): {}", status, self);
        }
        (
            status,
            Json(ErrorResponse {
                detail: self.to_string(),
            }),
        )
            .into_response()
    }
}

// Extractor rejections would otherwise reach the client as plain text.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::TaskNotFound(_) => Self::NotFound(NO_DOCUMENTS.to_string()),
            StoreError::InvalidTaskId(_) | StoreError::InvalidFilename(_) => {
                Self::BadRequest(err.to_string())
            }
            StoreError::FileNotFound { .. } => Self::NotFound(err.to_string()),
            StoreError::Io { .. } => Self::Internal(err.to_string()),
        }
    }
}

impl From<LlmError> for ApiError {
    fn from(err: LlmError) -> Self {
        match err.kind {
            LlmErrorKind::MissingCredential => Self::Configuration(err.message),
            _ => Self::Upstream(err.to_string()),
        }
    }
}

impl From<ScoringError> for ApiError {
    fn from(err: ScoringError) -> Self {
        match err {
            ScoringError::Extract(ExtractError::Store(e)) => e.into(),
            ScoringError::Extract(ExtractError::NoDocuments(_)) => {
                Self::NotFound(NO_DOCUMENTS.to_string())
            }
            ScoringError::Extract(e) => Self::Internal(e.to_string()),
            ScoringError::Criteria(e) => Self::Internal(e.to_string()),
            ScoringError::Llm(e) => e.into(),
        }
    }
}
