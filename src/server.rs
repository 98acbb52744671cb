//! JSON HTTP server.
//!
//! Exposes a shared [`Pipeline`] over HTTP.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/query` | Answer `{question, k?}` with a `QueryResponse` |
//! | `POST` | `/documents` | Replace the corpus with a JSON array of texts |
//! | `GET`  | `/stats` | Running counters and index state |
//!
//! # Error Contract
//!
//! All error responses share one shape:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `provider_error` (502),
//! `configuration` (500), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use ragloop_core::{Error, Pipeline, PipelineStats, QueryResponse};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    pipeline: Arc<Pipeline>,
}

/// Build the router. Exposed separately from [`run_server`] so tests can
/// serve it on an ephemeral port.
pub fn router(pipeline: Arc<Pipeline>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/query", post(handle_query))
        .route("/documents", post(handle_documents))
        .route("/stats", get(handle_stats))
        .layer(cors)
        .with_state(AppState { pipeline })
}

/// Serve `pipeline` on `bind_addr` until the process is terminated.
pub async fn run_server(pipeline: Arc<Pipeline>, bind_addr: &str) -> anyhow::Result<()> {
    let app = router(pipeline);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(addr = %bind_addr, "server listening");
    println!("ragloop server listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

/// Inner error detail with a machine-readable code and human-readable message.
#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

/// Constructs a 400 Bad Request error.
fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        let (status, code) = match &err {
            Error::Provider { .. } => (StatusCode::BAD_GATEWAY, "provider_error"),
            Error::Configuration(_) => (StatusCode::INTERNAL_SERVER_ERROR, "configuration"),
            Error::Parse(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        error!(code, error = %err, "request failed");
        AppError {
            status,
            code: code.to_string(),
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

// ============ GET /health ============

/// JSON response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    /// Always `"ok"` when the server is running.
    status: String,
    /// The crate version from `Cargo.toml`.
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /query ============

#[derive(Deserialize)]
struct QueryRequest {
    question: String,
    #[serde(default)]
    k: Option<usize>,
}

/// Handler for `POST /query`.
///
/// Returns `400` for an empty question or `k = 0`, `502` when a provider
/// fails.
async fn handle_query(
    State(state): State<AppState>,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, AppError> {
    let Json(req) = body?;
    if req.question.trim().is_empty() {
        return Err(bad_request("question must not be empty"));
    }
    if req.k == Some(0) {
        return Err(bad_request("k must be >= 1"));
    }

    let response = state.pipeline.process(&req.question, req.k).await?;
    Ok(Json(response))
}

// ============ POST /documents ============

#[derive(Serialize)]
struct DocumentsResponse {
    status: String,
    count: usize,
    chunks: usize,
}

/// Handler for `POST /documents`. Replaces the indexed corpus.
async fn handle_documents(
    State(state): State<AppState>,
    body: Result<Json<Vec<String>>, JsonRejection>,
) -> Result<Json<DocumentsResponse>, AppError> {
    let Json(texts) = body?;
    let report = state.pipeline.add_documents(texts).await?;
    Ok(Json(DocumentsResponse {
        status: "ok".to_string(),
        count: report.documents,
        chunks: report.chunks,
    }))
}

// ============ GET /stats ============

async fn handle_stats(State(state): State<AppState>) -> Json<PipelineStats> {
    Json(state.pipeline.stats())
}
