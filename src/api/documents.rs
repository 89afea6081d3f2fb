//! Task document endpoints:
//! - issue a task id
//! - absorb uploaded files into a task
//! - score a task's documents against the criteria exemplar
//! - list a task's documents

use std::sync::Arc;

use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, PathRejection},
        Multipart, Path, State,
    },
    Json,
};
use bytes::Bytes;
use serde_json::Value;
use uuid::Uuid;

use super::error::ApiError;
use super::routes::AppState;
use super::types::{AbsorbResponse, QueryCriteriaRequest, TaskDocumentsResponse, TaskIdResponse};
use crate::store::{validate_task_id, StoreError};

/// Parsed `/absorb-document/` form.
struct AbsorbForm {
    task_id: String,
    files: Vec<(String, Bytes)>,
}

/// Read the multipart form. Fields may come in any order, so files are
/// buffered until `task_id` is known.
async fn parse_absorb_form(mut multipart: Multipart) -> Result<AbsorbForm, ApiError> {
    let mut task_id: Option<String> = None;
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read form field: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "task_id" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read task_id: {}", e)))?;
                task_id = Some(value);
            }
            "files" => {
                let filename = field.file_name().unwrap_or("upload.bin").to_string();
                let data = field.bytes().await.map_err(|e| {
                    ApiError::BadRequest(format!("Failed to read file {}: {}", filename, e))
                })?;
                files.push((filename, data));
            }
            // Unread fields are skipped by the next `next_field` call.
            _ => {}
        }
    }

    let task_id = task_id.ok_or_else(|| ApiError::BadRequest("task_id is required".to_string()))?;
    if files.is_empty() {
        return Err(ApiError::BadRequest("No files uploaded".to_string()));
    }

    Ok(AbsorbForm { task_id, files })
}

/// POST /generate-task-id - Issue a fresh task id (UUID v4).
pub async fn generate_task_id() -> Json<TaskIdResponse> {
    Json(TaskIdResponse {
        task_id: Uuid::new_v4().to_string(),
    })
}

/// POST /absorb-document/ - Save uploaded files under a task id.
///
/// Files are written in upload order; the first failure aborts the rest of
/// the batch without removing files already written.
pub async fn absorb_document(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AbsorbResponse>, ApiError> {
    let form = parse_absorb_form(multipart?).await?;
    validate_task_id(&form.task_id)?;

    let mut saved_files = Vec::with_capacity(form.files.len());
    for (filename, data) in &form.files {
        let location = state
            .store
            .save(&form.task_id, filename, data)
            .await
            .map_err(|e| match e {
                StoreError::InvalidFilename(_) => ApiError::BadRequest(e.to_string()),
                _ => ApiError::Internal(format!("Failed to absorb document(s): {}", e)),
            })?;
        saved_files.push(location);
    }

    tracing::info!(
        "Absorbed {} file(s) for task {}",
        saved_files.len(),
        form.task_id
    );

    Ok(Json(AbsorbResponse {
        message: format!(
            "{} file(s) absorbed for task_id {}",
            saved_files.len(),
            form.task_id
        ),
        saved_files,
    }))
}

/// POST /query_criteria/ - Score the task's documents.
///
/// Returns the model's JSON as-is, or `{"raw_response": ...}` when the
/// completion is not JSON.
pub async fn query_criteria(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<QueryCriteriaRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = payload?;
    let result = state.scorer.score(state.store.as_ref(), &req.task_id).await?;
    Ok(Json(result))
}

/// GET /tasks/:task_id/documents - List the files absorbed for a task.
pub async fn list_documents(
    State(state): State<Arc<AppState>>,
    task_id: Result<Path<String>, PathRejection>,
) -> Result<Json<TaskDocumentsResponse>, ApiError> {
    let Path(task_id) = task_id?;
    let files = state.store.list(&task_id).await?;
    Ok(Json(TaskDocumentsResponse { task_id, files }))
}
