//! Criteria exemplar loading.
//!
//! The exemplar is the only description of the expected scoring output. It is
//! read from disk on every query and handed to the prompt builder untouched.

use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CriteriaError {
    #[error("Failed to read criteria template {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in criteria template {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Read and parse the criteria exemplar.
pub async fn load_criteria(path: &Path) -> Result<Value, CriteriaError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CriteriaError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    serde_json::from_str(&content).map_err(|source| CriteriaError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
