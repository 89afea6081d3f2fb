//! Task storage.
//!
//! A task is an opaque identifier that owns a flat set of named files. The
//! HTTP layer only ever adds files; `delete` exists for embedders and tests.
//!
//! Two backends are provided:
//! - [`FsTaskStore`]: one directory per task under a root directory
//! - [`MemoryTaskStore`]: process-local map, used in tests

mod fs;
mod memory;

pub use fs::FsTaskStore;
pub use memory::MemoryTaskStore;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid task id: {0:?}")]
    InvalidTaskId(String),

    #[error("Invalid file name: {0:?}")]
    InvalidFilename(String),

    #[error("No documents found for task {0}")]
    TaskNotFound(String),

    #[error("File {filename} not found in task {task_id}")]
    FileNotFound { task_id: String, filename: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage backend for task documents.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Make sure the task exists. Idempotent.
    async fn create(&self, task_id: &str) -> StoreResult<()>;

    async fn exists(&self, task_id: &str) -> StoreResult<bool>;

    /// Write a file into the task, creating the task if needed and replacing
    /// any file with the same name. Returns the resolved storage location.
    async fn save(&self, task_id: &str, filename: &str, data: &[u8]) -> StoreResult<String>;

    /// File names of a task in backend listing order.
    async fn list(&self, task_id: &str) -> StoreResult<Vec<String>>;

    async fn read(&self, task_id: &str, filename: &str) -> StoreResult<Vec<u8>>;

    /// Remove a task and all of its files.
    async fn delete(&self, task_id: &str) -> StoreResult<()>;
}

pub type SharedTaskStore = Arc<dyn TaskStore>;

/// Reject ids that could escape the storage root.
pub fn validate_task_id(task_id: &str) -> StoreResult<()> {
    let trimmed = task_id.trim();
    if trimmed.is_empty()
        || trimmed == "."
        || task_id.contains("..")
        || task_id.contains(['/', '\\', '\0'])
    {
        return Err(StoreError::InvalidTaskId(task_id.to_string()));
    }
    Ok(())
}

/// Keep only the final path component of an uploaded file name.
///
/// The component itself is kept byte for byte; names that cannot be a plain
/// file (empty, `.`, `..`, NUL) are rejected.
pub fn sanitize_filename(name: &str) -> StoreResult<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    if base.trim().is_empty() || base == "." || base == ".." || base.contains('\0') {
        return Err(StoreError::InvalidFilename(name.to_string()));
    }
    Ok(base.to_string())
}
