//! JSON HTTP API over the pipeline entry points.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/documents` | Sorted document names, for filter pickers |
//! | `POST` | `/answer` | Answer a question, optionally within one document |
//! | `GET`  | `/index` | Index status: collection, built, record count |
//! | `POST` | `/index/rebuild` | Full index rebuild, returns the summary |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `no_content` (422), `upstream` (502),
//! `missing_credential` (503), `internal` (500).
//!
//! A refusal is not an error: `/answer` returns 200 with `refused: true`.
//! A missing API key is not one either for `/answer`, which returns the
//! credential message as its answer.
//!
//! Rebuilds, explicit or triggered by a question against a missing index,
//! are serialized by the [`Assistant`].
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser front end
//! on another port can call the API.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::answer::REFUSAL;
use crate::assistant::{Assistant, Backend};
use crate::config::Config;
use crate::generation::GenerationError;
use crate::index::IndexError;
use crate::models::{IndexStatus, IndexSummary};
use crate::retriever::RetrieveError;

/// Shared application state passed to all route handlers.
struct AppState<B: Backend> {
    assistant: Assistant<B>,
}

/// Start the HTTP server on `[server].bind` with the production backend.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = router(Assistant::new(config.clone()));

    tracing::info!(address = %bind_addr, "handbook API listening");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the router around any backend.
pub fn router<B: Backend + 'static>(assistant: Assistant<B>) -> Router {
    let state = Arc::new(AppState { assistant });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/documents", get(handle_documents::<B>))
        .route("/answer", post(handle_answer::<B>))
        .route("/index", get(handle_index_status::<B>))
        .route("/index/rebuild", post(handle_rebuild::<B>))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn no_content(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::UNPROCESSABLE_ENTITY,
        code: "no_content",
        message: message.into(),
    }
}

fn upstream(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_GATEWAY,
        code: "upstream",
        message: message.into(),
    }
}

fn missing_credential(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::SERVICE_UNAVAILABLE,
        code: "missing_credential",
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: message.into(),
    }
}

/// Map a pipeline error onto a status code.
fn classify_error(err: anyhow::Error) -> AppError {
    let message = format!("{:#}", err);

    if let Some(index_err) = err.downcast_ref::<IndexError>() {
        return match index_err {
            IndexError::MissingCredential(var) => {
                tracing::warn!(variable = %var, "rebuild requested without API key");
                missing_credential(message)
            }
            IndexError::NoContent => no_content(message),
            IndexError::Embedding(_) => upstream(message),
            IndexError::Load(_) | IndexError::Store(_) => internal(message),
        };
    }

    if err.downcast_ref::<RetrieveError>().is_some()
        || err.downcast_ref::<GenerationError>().is_some()
        || err.chain().any(|cause| cause.is::<reqwest::Error>())
    {
        return upstream(message);
    }

    tracing::error!(error = %message, "request failed");
    internal(message)
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /documents ============

#[derive(Serialize)]
struct DocumentsResponse {
    documents: Vec<String>,
}

async fn handle_documents<B: Backend>(
    State(state): State<Arc<AppState<B>>>,
) -> Result<Json<DocumentsResponse>, AppError> {
    let documents = state
        .assistant
        .list_document_names()
        .map_err(classify_error)?;
    Ok(Json(DocumentsResponse { documents }))
}

// ============ POST /answer ============

#[derive(Deserialize)]
struct AnswerRequest {
    question: String,
    #[serde(default)]
    document: Option<String>,
}

#[derive(Serialize)]
struct AnswerResponse {
    answer: String,
    refused: bool,
}

async fn handle_answer<B: Backend>(
    State(state): State<Arc<AppState<B>>>,
    Json(req): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>, AppError> {
    if req.question.trim().is_empty() {
        return Err(bad_request("question must not be empty"));
    }

    let answer = state
        .assistant
        .get_answer(&req.question, req.document.as_deref())
        .await
        .map_err(classify_error)?;

    Ok(Json(AnswerResponse {
        refused: answer == REFUSAL,
        answer,
    }))
}

// ============ GET /index ============

async fn handle_index_status<B: Backend>(
    State(state): State<Arc<AppState<B>>>,
) -> Result<Json<IndexStatus>, AppError> {
    let status = state
        .assistant
        .index_status()
        .await
        .map_err(classify_error)?;
    Ok(Json(status))
}

// ============ POST /index/rebuild ============

async fn handle_rebuild<B: Backend>(
    State(state): State<Arc<AppState<B>>>,
) -> Result<Json<IndexSummary>, AppError> {
    let summary = state
        .assistant
        .build_index()
        .await
        .map_err(classify_error)?;
    Ok(Json(summary))
}
