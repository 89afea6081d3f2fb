//! Filesystem-backed task store: `<root>/<task_id>/<filename>`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::{sanitize_filename, validate_task_id, StoreError, StoreResult, TaskStore};

/// Stores each task as a directory under `root`.
#[derive(Debug, Clone)]
pub struct FsTaskStore {
    root: PathBuf,
}

impl FsTaskStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding a task's files. The id is validated first.
    pub fn task_dir(&self, task_id: &str) -> StoreResult<PathBuf> {
        validate_task_id(task_id)?;
        Ok(self.root.join(task_id))
    }

    async fn existing_task_dir(&self, task_id: &str) -> StoreResult<PathBuf> {
        let dir = self.task_dir(task_id)?;
        if !fs::try_exists(&dir).await.map_err(io_err(&dir))? {
            return Err(StoreError::TaskNotFound(task_id.to_string()));
        }
        Ok(dir)
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[async_trait]
impl TaskStore for FsTaskStore {
    async fn create(&self, task_id: &str) -> StoreResult<()> {
        let dir = self.task_dir(task_id)?;
        fs::create_dir_all(&dir).await.map_err(io_err(&dir))
    }

    async fn exists(&self, task_id: &str) -> StoreResult<bool> {
        let dir = self.task_dir(task_id)?;
        fs::try_exists(&dir).await.map_err(io_err(&dir))
    }

    async fn save(&self, task_id: &str, filename: &str, data: &[u8]) -> StoreResult<String> {
        let dir = self.task_dir(task_id)?;
        fs::create_dir_all(&dir).await.map_err(io_err(&dir))?;

        let path = dir.join(sanitize_filename(filename)?);
        fs::write(&path, data).await.map_err(io_err(&path))?;
        tracing::debug!("Saved {} ({} bytes)", path.display(), data.len());
        Ok(path.display().to_string())
    }

    async fn list(&self, task_id: &str) -> StoreResult<Vec<String>> {
        let dir = self.existing_task_dir(task_id).await?;
        let mut entries = fs::read_dir(&dir).await.map_err(io_err(&dir))?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err(&dir))? {
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if is_file {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(names)
    }

    async fn read(&self, task_id: &str, filename: &str) -> StoreResult<Vec<u8>> {
        let dir = self.existing_task_dir(task_id).await?;
        let path = dir.join(sanitize_filename(filename)?);
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::FileNotFound {
                task_id: task_id.to_string(),
                filename: filename.to_string(),
            }),
            Err(e) => Err(io_err(&path)(e)),
        }
    }

    async fn delete(&self, task_id: &str) -> StoreResult<()> {
        let dir = self.existing_task_dir(task_id).await?;
        fs::remove_dir_all(&dir).await.map_err(io_err(&dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_save_creates_task_and_overwrites() {
        let temp = tempdir().unwrap();
        let store = FsTaskStore::new(temp.path());

        assert!(!store.exists("t1").await.unwrap());
        store.save("t1", "a.pdf", b"first").await.unwrap();
        store.save("t1", "b.pdf", b"second").await.unwrap();
        let path = store.save("t1", "a.pdf", b"replaced").await.unwrap();

        assert!(store.exists("t1").await.unwrap());
        assert!(path.ends_with("a.pdf"));

        let mut names = store.list("t1").await.unwrap();
        names.sort();
        assert_eq!(names, vec!["a.pdf", "b.pdf"]);
        assert_eq!(store.read("t1", "a.pdf").await.unwrap(), b"replaced");
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let temp = tempdir().unwrap();
        let store = FsTaskStore::new(temp.path());
        store.create("t2").await.unwrap();
        store.create("t2").await.unwrap();
        assert!(store.list("t2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_task_is_not_found() {
        let temp = tempdir().unwrap();
        let store = FsTaskStore::new(temp.path());
        assert!(matches!(
            store.list("missing").await,
            Err(StoreError::TaskNotFound(_))
        ));
        assert!(matches!(
            store.read("missing", "a.pdf").await,
            Err(StoreError::TaskNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unreadable_root_is_io_error() {
        let temp = tempdir().unwrap();
        let root = temp.path().join("not-a-dir");
        std::fs::write(&root, b"plain file").unwrap();
        let store = FsTaskStore::new(&root);

        assert!(matches!(store.list("t").await, Err(StoreError::Io { .. })));
        assert!(matches!(store.exists("t").await, Err(StoreError::Io { .. })));
    }

    #[tokio::test]
    async fn test_inner_dots_keep_distinct_files() {
        let temp = tempdir().unwrap();
        let store = FsTaskStore::new(temp.path());
        store.save("t5", "a.pdf", b"one").await.unwrap();
        store.save("t5", "a..pdf", b"two").await.unwrap();

        let mut names = store.list("t5").await.unwrap();
        names.sort();
        assert_eq!(names, vec!["a..pdf", "a.pdf"]);
        assert_eq!(store.read("t5", "a.pdf").await.unwrap(), b"one");
    }

    #[tokio::test]
    async fn test_traversal_stays_inside_task_dir() {
        let temp = tempdir().unwrap();
        let store = FsTaskStore::new(temp.path().join("root"));
        store.save("t3", "../../escape.pdf", b"x").await.unwrap();
        assert!(temp.path().join("root/t3/escape.pdf").exists());
        assert!(!temp.path().join("escape.pdf").exists());
        assert!(store.save("../t3", "a.pdf", b"x").await.is_err());
    }

    #[tokio::test]
    async fn test_delete_removes_files() {
        let temp = tempdir().unwrap();
        let store = FsTaskStore::new(temp.path());
        store.save("t4", "a.pdf", b"x").await.unwrap();
        store.delete("t4").await.unwrap();
        assert!(!store.exists("t4").await.unwrap());
    }
}
