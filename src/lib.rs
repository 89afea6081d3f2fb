//! # Tender Review
//!
//! HTTP backend that scores tender documents against a list of criteria with
//! an LLM.
//!
//! ## Flow
//! 1. Client obtains a task id (`POST /generate-task-id`)
//! 2. Client uploads PDFs under that id (`POST /absorb-document/`)
//! 3. Client asks for scoring (`POST /query_criteria/`)
//! 4. The PDFs are turned into text, combined with the criteria exemplar into
//!    a prompt and sent to Mistral; the JSON answer is returned as-is
//!
//! ## Modules
//! - `api`: axum routes and server bootstrap
//! - `config`: environment configuration
//! - `store`: task document storage (filesystem, in-memory)
//! - `extract`: PDF text extraction
//! - `criteria`: criteria exemplar loading
//! - `prompt`: scoring prompt construction
//! - `llm`: chat-completions gateway
//! - `scoring`: the criteria query pipeline

pub mod api;
pub mod config;
pub mod criteria;
pub mod extract;
pub mod llm;
pub mod prompt;
pub mod scoring;
pub mod store;

pub use config::Config;
