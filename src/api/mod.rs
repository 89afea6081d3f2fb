//! HTTP API.
//!
//! Routes:
//! - `GET /`, `GET /health`, `GET /api/status`: banner and status
//! - `POST /chat`: generic chat completion
//! - `POST /generate-task-id`, `POST /absorb-document/`: task documents
//! - `POST /query_criteria/`: criteria scoring
//! - `GET /tasks/:task_id/documents`: list absorbed files

mod chat;
mod documents;
pub mod error;
mod routes;
pub mod types;

pub use error::ApiError;
pub use routes::{router, serve, AppState, SERVICE_NAME};

#[cfg(test)]
mod tests;
