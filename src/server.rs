//! HTTP surface.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Service banner with the configured model |
//! | `GET`  | `/health` | Liveness check |
//! | `GET`  | `/quote` | Quote of the day |
//! | `POST` | `/train` | Replace the index with a task/note snapshot |
//! | `POST` | `/chat` | Answer a question as an NDJSON token stream |
//!
//! # Error Contract
//!
//! Failures before a response starts use a JSON envelope:
//!
//! ```json
//! { "error": { "code": "model_loading", "message": "...", "retryable": true } }
//! ```
//!
//! | Code | Status |
//! |------|--------|
//! | `configuration_error` | 500 |
//! | `index_unavailable` | 503 |
//! | `model_loading` | 503, with `Retry-After` |
//! | `internal` | 500 |
//!
//! A `/chat` stream that fails after its first line ends with one line
//! carrying the same `error` object, then closes.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted. There is no
//! authentication layer.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::backends::Backends;
use crate::chat;
use crate::config::Config;
use crate::error::RagError;
use crate::ingest;
use crate::models::{ChatQuery, SyncRequest};
use crate::quotes::{Quote, QuoteBook};

/// Seconds a client is asked to wait while the model warms up.
const RETRY_AFTER_SECS: u64 = 10;

#[derive(Clone)]
struct AppState {
    backends: Arc<Backends>,
    quotes: Arc<QuoteBook>,
}

/// Start the server with collaborators created from `config` on first use.
///
/// Binds `server.host:server.port` and runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let backends = Arc::new(Backends::new(Arc::new(config.clone())));
    run_server_with_backends(config, backends).await
}

/// Like [`run_server`], but with caller-supplied collaborator handles.
pub async fn run_server_with_backends(
    config: &Config,
    backends: Arc<Backends>,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind_addr();
    let quotes = Arc::new(QuoteBook::load(&config.quotes.path));
    let app = router(backends, quotes);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, model = %config.model.name, "server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

/// The application router, without a listener.
pub fn router(backends: Arc<Backends>, quotes: Arc<QuoteBook>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/quote", get(handle_quote))
        .route("/train", post(handle_train))
        .route("/chat", post(handle_chat))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { backends, quotes })
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
    retryable: bool,
}

impl From<&RagError> for ErrorDetail {
    fn from(err: &RagError) -> Self {
        Self {
            code: err.kind(),
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}

struct AppError(RagError);

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        Self(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            RagError::Configuration(_) | RagError::Failed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RagError::IndexUnavailable(_) | RagError::ModelLoading(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        };
        let body = ErrorBody {
            error: ErrorDetail::from(&self.0),
        };

        let mut response = (status, Json(body)).into_response();
        if matches!(self.0, RagError::ModelLoading(_)) {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(RETRY_AFTER_SECS));
        }
        response
    }
}

// ============ GET / and /health ============

#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    model: String,
}

async fn handle_root(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "Task Master AI Backend is Online",
        model: state.backends.model_label(),
    })
}

async fn handle_health(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "alive",
        model: state.backends.model_label(),
    })
}

// ============ GET /quote ============

async fn handle_quote(State(state): State<AppState>) -> Json<Quote> {
    Json(state.quotes.today())
}

// ============ POST /train ============

#[derive(Serialize)]
struct TrainResponse {
    status: &'static str,
    indexed_items: usize,
}

async fn handle_train(
    State(state): State<AppState>,
    Json(request): Json<SyncRequest>,
) -> Result<Json<TrainResponse>, AppError> {
    let report = ingest::sync(&state.backends, request).await?;
    Ok(Json(TrainResponse {
        status: "success",
        indexed_items: report.indexed_items,
    }))
}

// ============ POST /chat ============

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
    #[serde(default)]
    context_window: Option<usize>,
}

/// Streams `{"token": ...}` lines, one per generated fragment.
async fn handle_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Response, AppError> {
    let query = ChatQuery {
        message: request.message,
        context_window: request
            .context_window
            .unwrap_or(state.backends.config().retrieval.default_k),
    };

    let fragments = chat::answer_stream(&state.backends, &query).await?;
    let lines = fragments.map(|item| {
        let line = match item {
            Ok(token) => serde_json::json!({ "token": token }),
            Err(e) => serde_json::json!({ "error": ErrorDetail::from(&e) }),
        };
        Ok::<_, Infallible>(format!("{}\n", line))
    });

    Ok((
        [(header::CONTENT_TYPE, "application/x-ndjson")],
        Body::from_stream(lines),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let resp = AppError(RagError::ModelLoading("warming".into())).into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(resp.headers()[header::RETRY_AFTER], "10");

        let resp = AppError(RagError::Configuration("no key".into())).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(resp.headers().get(header::RETRY_AFTER).is_none());

        let resp = AppError(RagError::IndexUnavailable("down".into())).into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_error_detail_fields() {
        let detail = ErrorDetail::from(&RagError::IndexUnavailable("down".into()));
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["code"], "index_unavailable");
        assert_eq!(json["retryable"], true);
    }
}
