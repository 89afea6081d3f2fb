use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use super::{router, AppState};
use crate::config::Config;
use crate::extract::tests::sample_pdf;
use crate::llm::{ChatOptions, LlmError};
use crate::scoring::tests::StubLlm;
use crate::scoring::CriteriaScorer;
use crate::store::{
    FsTaskStore, MemoryTaskStore, SharedTaskStore, StoreError, StoreResult, TaskStore,
};

const BOUNDARY: &str = "----tender-review-test-boundary";

struct Harness {
    app: Router,
    store: SharedTaskStore,
    scoring: Arc<StubLlm>,
    chat: Arc<StubLlm>,
    _temp: TempDir,
}

fn harness_with(store: SharedTaskStore, scoring: StubLlm, chat: StubLlm) -> Harness {
    let temp = tempfile::tempdir().unwrap();
    let template: PathBuf = temp.path().join("example.json");
    std::fs::write(
        &template,
        r#"[{"critere": "Conformité", "note": 0, "commentaire": "", "couleur": "rouge"}]"#,
    )
    .unwrap();

    let scoring = Arc::new(scoring);
    let chat = Arc::new(chat);
    let config = Config {
        criteria_template: template.clone(),
        ..Config::default()
    };
    let scorer = CriteriaScorer::new(
        scoring.clone(),
        "mistral-large-latest",
        ChatOptions::default(),
        template,
    );
    let state = Arc::new(AppState {
        config,
        store: Arc::clone(&store),
        scorer,
        chat: chat.clone(),
    });

    Harness {
        app: router(state),
        store,
        scoring,
        chat,
        _temp: temp,
    }
}

fn harness(scoring: StubLlm) -> Harness {
    harness_with(
        Arc::new(MemoryTaskStore::new()),
        scoring,
        StubLlm::replying("hello"),
    )
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn absorb_request(task_id: Option<&str>, files: &[(&str, &[u8])]) -> Request<Body> {
    let mut body: Vec<u8> = Vec::new();
    if let Some(task_id) = task_id {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"task_id\"\r\n\r\n{task_id}\r\n"
            )
            .as_bytes(),
        );
    }
    for (name, data) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\n\
                 Content-Type: application/pdf\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/absorb-document/")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Memory store whose `fail_on`-th save (1-based) fails with an I/O error.
struct FailingSaveStore {
    inner: MemoryTaskStore,
    saves: AtomicUsize,
    fail_on: usize,
}

#[async_trait]
impl TaskStore for FailingSaveStore {
    async fn create(&self, task_id: &str) -> StoreResult<()> {
        self.inner.create(task_id).await
    }

    async fn exists(&self, task_id: &str) -> StoreResult<bool> {
        self.inner.exists(task_id).await
    }

    async fn save(&self, task_id: &str, filename: &str, data: &[u8]) -> StoreResult<String> {
        if self.saves.fetch_add(1, Ordering::SeqCst) + 1 == self.fail_on {
            return Err(StoreError::Io {
                path: PathBuf::from(task_id).join(filename),
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            });
        }
        self.inner.save(task_id, filename, data).await
    }

    async fn list(&self, task_id: &str) -> StoreResult<Vec<String>> {
        self.inner.list(task_id).await
    }

    async fn read(&self, task_id: &str, filename: &str) -> StoreResult<Vec<u8>> {
        self.inner.read(task_id, filename).await
    }

    async fn delete(&self, task_id: &str) -> StoreResult<()> {
        self.inner.delete(task_id).await
    }
}

#[tokio::test]
async fn test_banner_health_and_status() {
    let h = harness_with(
        Arc::new(MemoryTaskStore::new()),
        StubLlm::replying("{}"),
        StubLlm::unconfigured(),
    );

    let (status, body) = send(&h.app, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().unwrap().contains("running"));

    let (status, body) = send(&h.app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "healthy", "service": "tender-review"}));

    let (status, body) = send(&h.app, get("/api/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["api_key_configured"], false);
    assert_eq!(body["scoring_key_configured"], true);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_generate_task_id_is_unique() {
    let h = harness(StubLlm::replying("{}"));

    let (status, first) = send(&h.app, post_json("/generate-task-id", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    let (_, second) = send(&h.app, post_json("/generate-task-id", json!({}))).await;

    let first = first["task_id"].as_str().unwrap().to_string();
    let second = second["task_id"].as_str().unwrap().to_string();
    assert_ne!(first, second);
    assert_eq!(uuid::Uuid::parse_str(&first).unwrap().get_version_num(), 4);
}

#[tokio::test]
async fn test_reupload_replaces_same_named_file() {
    let temp = tempfile::tempdir().unwrap();
    let store: SharedTaskStore = Arc::new(FsTaskStore::new(temp.path()));
    let h = harness_with(store, StubLlm::replying("{}"), StubLlm::replying(""));

    let (status, body) = send(
        &h.app,
        absorb_request(Some("task-1"), &[("a.pdf", b"one"), ("b.pdf", b"two")]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "2 file(s) absorbed for task_id task-1");
    assert_eq!(body["saved_files"].as_array().unwrap().len(), 2);

    let (status, _) = send(
        &h.app,
        absorb_request(Some("task-1"), &[("a.pdf", b"one-updated")]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let mut names = h.store.list("task-1").await.unwrap();
    names.sort();
    assert_eq!(names, vec!["a.pdf", "b.pdf"]);
    assert_eq!(h.store.read("task-1", "a.pdf").await.unwrap(), b"one-updated");
    assert!(temp.path().join("task-1").join("a.pdf").exists());

    let (status, body) = send(&h.app, get("/tasks/task-1/documents")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["files"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_absorb_rejects_bad_forms() {
    let h = harness(StubLlm::replying("{}"));

    let (status, body) = send(&h.app, absorb_request(None, &[("a.pdf", b"x")])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "task_id is required");

    let (status, _) = send(&h.app, absorb_request(Some("t"), &[])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&h.app, absorb_request(Some("../etc"), &[("a.pdf", b"x")])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_query_unknown_task_is_not_found() {
    let h = harness(StubLlm::replying("{}"));

    let (status, body) = send(
        &h.app,
        post_json("/query_criteria/", json!({"task_id": "never-uploaded"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "No documents found for this task_id");

    let (status, _) = send(&h.app, get("/tasks/never-uploaded/documents")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_query_returns_parsed_json() {
    let h = harness(StubLlm::replying(
        r#"[{"critere": "Conformité", "note": 18, "commentaire": "Complet", "couleur": "vert"}]"#,
    ));
    h.store
        .save("t", "dce.pdf", &sample_pdf(&["Dossier de consultation"]))
        .await
        .unwrap();
    h.store.save("t", "corrupt.pdf", b"%PDF-garbage").await.unwrap();

    let (status, body) = send(&h.app, post_json("/query_criteria/", json!({"task_id": "t"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["note"], 18);

    let prompts = h.scoring.prompts.lock().unwrap();
    assert!(prompts[0].contains("Dossier de consultation"));
    assert!(prompts[0].contains("[Extraction error corrupt.pdf: "));
    assert!(prompts[0].contains("\"critere\": \"Conformité\""));
}

#[tokio::test]
async fn test_query_wraps_non_json_completion() {
    let h = harness(StubLlm::replying("Je ne peux pas noter ces documents."));
    h.store.create("t").await.unwrap();

    let (status, body) = send(&h.app, post_json("/query_criteria", json!({"task_id": "t"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"raw_response": "Je ne peux pas noter ces documents."})
    );
}

#[tokio::test]
async fn test_query_upstream_failure_surfaces_body() {
    let h = harness(StubLlm::failing(LlmError::client_error(
        "Mistral",
        401,
        "{\"message\":\"Unauthorized\"}".to_string(),
    )));
    h.store.create("t").await.unwrap();

    let (status, body) = send(&h.app, post_json("/query_criteria/", json!({"task_id": "t"}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["detail"].as_str().unwrap().contains("Unauthorized"));
}

#[tokio::test]
async fn test_query_without_credential_is_server_error() {
    let h = harness(StubLlm::unconfigured());
    h.store.create("t").await.unwrap();

    let (status, body) = send(&h.app, post_json("/query_criteria/", json!({"task_id": "t"}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["detail"], "Stub API key not configured");
}

#[tokio::test]
async fn test_chat_uses_default_model() {
    let h = harness(StubLlm::replying("{}"));

    let (status, body) = send(&h.app, post_json("/chat", json!({"message": "Bonjour"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"response": "hello"}));
    assert_eq!(*h.chat.models.lock().unwrap(), vec!["gpt-3.5-turbo"]);

    let (status, _) = send(
        &h.app,
        post_json("/chat", json!({"message": "Bonjour", "model": "gpt-4o-mini"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(h.chat.models.lock().unwrap()[1], "gpt-4o-mini");
}

#[tokio::test]
async fn test_chat_failures() {
    let h = harness_with(
        Arc::new(MemoryTaskStore::new()),
        StubLlm::replying("{}"),
        StubLlm::unconfigured(),
    );
    let (status, body) = send(&h.app, post_json("/chat", json!({"message": "hi"}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["detail"], "Stub API key not configured");

    let h = harness_with(
        Arc::new(MemoryTaskStore::new()),
        StubLlm::replying("{}"),
        StubLlm::failing(LlmError::network_error("OpenAI", "Request timeout".to_string())),
    );
    let (status, body) = send(&h.app, post_json("/chat", json!({"message": "hi"}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .starts_with("Error processing request: "));
}

#[tokio::test]
async fn test_absorb_failure_keeps_earlier_files() {
    let store: SharedTaskStore = Arc::new(FailingSaveStore {
        inner: MemoryTaskStore::new(),
        saves: AtomicUsize::new(0),
        fail_on: 2,
    });
    let h = harness_with(store, StubLlm::replying("{}"), StubLlm::replying(""));

    let (status, body) = send(
        &h.app,
        absorb_request(
            Some("t"),
            &[("a.pdf", b"one"), ("b.pdf", b"two"), ("c.pdf", b"six")],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let detail = body["detail"].as_str().unwrap();
    assert!(detail.starts_with("Failed to absorb document(s): "));
    assert!(detail.contains("disk full"));

    assert_eq!(h.store.list("t").await.unwrap(), vec!["a.pdf"]);
}

#[tokio::test]
async fn test_absorb_keeps_inner_dots_in_names() {
    let h = harness(StubLlm::replying("{}"));

    let (status, body) = send(
        &h.app,
        absorb_request(Some("t"), &[("offre..v2.pdf", b"v2"), ("offre.pdf", b"v1")]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["saved_files"],
        json!(["memory://t/offre..v2.pdf", "memory://t/offre.pdf"])
    );
    assert_eq!(
        h.store.list("t").await.unwrap(),
        vec!["offre..v2.pdf", "offre.pdf"]
    );
}

#[tokio::test]
async fn test_absorb_skips_unknown_fields() {
    let h = harness(StubLlm::replying("{}"));

    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"comment\"\r\n\r\nignored\r\n\
         --{BOUNDARY}\r\nContent-Disposition: form-data; name=\"task_id\"\r\n\r\nt\r\n\
         --{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"a.pdf\"\r\n\r\nx\r\n\
         --{BOUNDARY}--\r\n"
    );
    let request = Request::builder()
        .method("POST")
        .uri("/absorb-document/")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();

    let (status, body) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "1 file(s) absorbed for task_id t");
}

#[tokio::test]
async fn test_malformed_requests_get_json_detail() {
    let h = harness(StubLlm::replying("{}"));

    let (status, body) = send(&h.app, post_json("/query_criteria/", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("task_id"));

    let (status, body) = send(&h.app, post_json("/chat", json!({"model": "gpt-4o"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("message"));

    let (status, body) = send(
        &h.app,
        post_json("/absorb-document/", json!({"task_id": "t"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());

    let not_json = Request::builder()
        .method("POST")
        .uri("/query_criteria")
        .header("content-type", "application/json")
        .body(Body::from("{ not json"))
        .unwrap();
    let (status, body) = send(&h.app, not_json).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());
}
