//! PDF text extraction.
//!
//! Every `.pdf` file of a task (or of a plain directory) is turned into a text
//! block `--- <filename> ---\n<page 1>\n<page 2>...`. A file that cannot be read
//! or parsed becomes an inline `[Extraction error <filename>: <cause>]` marker so
//! one bad upload never fails the whole batch. Blocks are joined with a blank
//! line, in listing order.

use std::path::{Path, PathBuf};

use lopdf::Document;
use thiserror::Error;

use crate::store::{StoreError, TaskStore};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("No documents found in {}", .0.display())]
    NoDocuments(PathBuf),

    #[error("Failed to read directory {}: {source}", path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("PDF extraction task failed: {0}")]
    Join(String),
}

/// Whether a file name designates a PDF (case-insensitive extension match).
pub fn is_pdf(name: &str) -> bool {
    name.to_lowercase().ends_with(".pdf")
}

/// Extract the text of an in-memory PDF, pages joined with `\n` in page order.
pub fn extract_pdf_text(data: &[u8]) -> Result<String, lopdf::Error> {
    let doc = Document::load_mem(data)?;
    let mut pages = Vec::new();
    // `get_pages` is keyed by page number, so iteration is in page order.
    for page_number in doc.get_pages().keys() {
        pages.push(doc.extract_text(&[*page_number])?);
    }
    Ok(pages.join("\n"))
}

fn render_block(filename: &str, extracted: Result<String, String>) -> String {
    match extracted {
        Ok(text) => format!("--- {} ---\n{}", filename, text),
        Err(e) => {
            tracing::warn!("Text extraction failed for {}: {}", filename, e);
            format!("[Extraction error {}: {}]", filename, e)
        }
    }
}

/// Render named documents into the combined prompt text. Non-PDF names are skipped.
pub fn render_documents<I>(documents: I) -> String
where
    I: IntoIterator<Item = (String, Result<Vec<u8>, String>)>,
{
    documents
        .into_iter()
        .filter(|(name, _)| is_pdf(name))
        .map(|(name, data)| {
            let extracted =
                data.and_then(|bytes| extract_pdf_text(&bytes).map_err(|e| e.to_string()));
            render_block(&name, extracted)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Extract all PDFs directly inside `dir` (no recursion).
///
/// A missing directory is an error rather than an empty result.
pub fn extract_directory(dir: &Path) -> Result<String, ExtractError> {
    if !dir.is_dir() {
        return Err(ExtractError::NoDocuments(dir.to_path_buf()));
    }
    let entries = std::fs::read_dir(dir).map_err(|source| ExtractError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut documents = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ExtractError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !is_pdf(&name) {
            continue;
        }
        let data = std::fs::read(&path).map_err(|e| e.to_string());
        documents.push((name, data));
    }

    Ok(render_documents(documents))
}

/// Extract all PDFs of a task from a store.
///
/// Parsing runs on the blocking pool. An unknown task yields
/// `StoreError::TaskNotFound`.
pub async fn extract_task(store: &dyn TaskStore, task_id: &str) -> Result<String, ExtractError> {
    let names = store.list(task_id).await?;

    let mut documents = Vec::new();
    for name in names.into_iter().filter(|n| is_pdf(n)) {
        let data = store.read(task_id, &name).await.map_err(|e| e.to_string());
        documents.push((name, data));
    }
    tracing::debug!(
        "Extracting text from {} PDF(s) for task {}",
        documents.len(),
        task_id
    );

    tokio::task::spawn_blocking(move || render_documents(documents))
        .await
        .map_err(|e| ExtractError::Join(e.to_string()))
}
