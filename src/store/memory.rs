//! In-memory task store.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use super::{sanitize_filename, validate_task_id, StoreError, StoreResult, TaskStore};

/// Keeps task files in a process-local map. Files are listed in first-upload order.
#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    tasks: RwLock<HashMap<String, Vec<(String, Bytes)>>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn create(&self, task_id: &str) -> StoreResult<()> {
        validate_task_id(task_id)?;
        self.tasks
            .write()
            .await
            .entry(task_id.to_string())
            .or_default();
        Ok(())
    }

    async fn exists(&self, task_id: &str) -> StoreResult<bool> {
        validate_task_id(task_id)?;
        Ok(self.tasks.read().await.contains_key(task_id))
    }

    async fn save(&self, task_id: &str, filename: &str, data: &[u8]) -> StoreResult<String> {
        validate_task_id(task_id)?;
        let name = sanitize_filename(filename)?;
        let mut tasks = self.tasks.write().await;
        let files = tasks.entry(task_id.to_string()).or_default();
        let data = Bytes::copy_from_slice(data);
        match files.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = data,
            None => files.push((name.clone(), data)),
        }
        Ok(format!("memory://{}/{}", task_id, name))
    }

    async fn list(&self, task_id: &str) -> StoreResult<Vec<String>> {
        validate_task_id(task_id)?;
        let tasks = self.tasks.read().await;
        let files = tasks
            .get(task_id)
            .ok_or_else(|| StoreError::TaskNotFound(task_id.to_string()))?;
        Ok(files.iter().map(|(n, _)| n.clone()).collect())
    }

    async fn read(&self, task_id: &str, filename: &str) -> StoreResult<Vec<u8>> {
        validate_task_id(task_id)?;
        let name = sanitize_filename(filename)?;
        let tasks = self.tasks.read().await;
        let files = tasks
            .get(task_id)
            .ok_or_else(|| StoreError::TaskNotFound(task_id.to_string()))?;
        files
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, data)| data.to_vec())
            .ok_or_else(|| StoreError::FileNotFound {
                task_id: task_id.to_string(),
                filename: filename.to_string(),
            })
    }

    async fn delete(&self, task_id: &str) -> StoreResult<()> {
        validate_task_id(task_id)?;
        self.tasks
            .write()
            .await
            .remove(task_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::TaskNotFound(task_id.to_string()))
    }
}
