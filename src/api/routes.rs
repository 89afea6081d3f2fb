//! HTTP routes and server bootstrap.

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::HeaderValue,
    response::Json,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::llm::{ChatCompletionsClient, LlmClient};
use crate::scoring::CriteriaScorer;
use crate::store::{FsTaskStore, SharedTaskStore};

use super::chat;
use super::documents;
use super::types::{HealthResponse, MessageResponse, StatusResponse};

pub const SERVICE_NAME: &str = "tender-review";

/// Shared application state.
pub struct AppState {
    pub config: Config,
    /// Uploaded documents, one entry per task id
    pub store: SharedTaskStore,
    /// Criteria scoring pipeline (Mistral)
    pub scorer: CriteriaScorer,
    /// Generic chat provider (OpenAI)
    pub chat: Arc<dyn LlmClient>,
}

impl AppState {
    /// Wire the production store and gateways from configuration.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let store: SharedTaskStore = Arc::new(FsTaskStore::new(config.data_dir.clone()));
        let scoring_llm: Arc<dyn LlmClient> =
            Arc::new(ChatCompletionsClient::from_config("Mistral", &config.scoring)?);
        let chat: Arc<dyn LlmClient> =
            Arc::new(ChatCompletionsClient::from_config("OpenAI", &config.chat)?);
        let scorer = CriteriaScorer::from_config(
            scoring_llm,
            &config.scoring,
            config.criteria_template.clone(),
        );

        Ok(Self {
            config,
            store,
            scorer,
            chat,
        })
    }
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/status", get(api_status))
        .route("/chat", post(chat::chat))
        .route("/generate-task-id", post(documents::generate_task_id))
        .route("/absorb-document/", post(documents::absorb_document))
        .route("/absorb-document", post(documents::absorb_document))
        .route("/query_criteria/", post(documents::query_criteria))
        .route("/query_criteria", post(documents::query_criteria))
        .route("/tasks/:task_id/documents", get(documents::list_documents))
        .layer(body_limit)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}: {}", o, e);
                None
            }
        })
        .collect();

    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    if !config.scoring.has_credential() {
        tracing::warn!("MISTRAL_API_KEY is not set; /query_criteria/ will fail");
    }
    if !config.chat.has_credential() {
        tracing::warn!("GPT_API_KEY is not set; /chat will fail");
    }
    tracing::info!("Storing task documents under {}", config.data_dir.display());

    let addr = config.bind_addr();
    let state = Arc::new(AppState::from_config(config)?);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, finishing in-flight requests");
}

/// Service banner.
async fn root() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Tender review backend is running!".to_string(),
    })
}

/// Health check endpoint.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
    })
}

/// Report which provider credentials are configured.
async fn api_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        api_key_configured: state.chat.is_configured(),
        scoring_key_configured: state.scorer.is_configured(),
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
