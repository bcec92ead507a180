//! HTTP server for the compile endpoint and the topic catalog
//!
//! `POST /compile` accepts `{ "code": "<C source>" }` and answers with
//! `{ wasm, output }` on success or an `{ error, details? }` body otherwise.
//! The catalog routes are read-only views over the catalog loaded at startup.

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use cforge_common::{Catalog, CompileRequestBody, CompileSuccessBody, ErrorBody, Topic, TopicSummary};
use cforge_compiler::{CompileResponse, CompileService, RequestError, ValidationError};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Error text for a body that is not a JSON object
pub const INVALID_BODY_MESSAGE: &str = "Invalid request body";

/// Error text for a body beyond the server's body limit
pub const SOURCE_TOO_LARGE_MESSAGE: &str = "Source too large";

/// Error text attached to every toolchain rejection
pub const COMPILATION_FAILED_MESSAGE: &str = "Compilation failed";

/// Error text for an unknown topic slug
pub const TOPIC_NOT_FOUND_MESSAGE: &str = "Topic not found";

/// Shared state for the HTTP server
#[derive(Clone)]
pub struct AppState {
    service: Arc<CompileService>,
    catalog: Arc<Catalog>,
    max_body_bytes: usize,
}

impl AppState {
    pub fn new(service: CompileService, catalog: Catalog, max_body_bytes: usize) -> Self {
        Self {
            service: Arc::new(service),
            catalog: Arc::new(catalog),
            max_body_bytes,
        }
    }

    pub fn service(&self) -> &CompileService {
        &self.service
    }
}

/// Body of `GET /health`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthBody {
    pub status: String,
    pub toolchain: String,
}

/// Create the HTTP router
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.max_body_bytes;

    Router::new()
        .route("/compile", post(handle_compile))
        .route("/health", get(handle_health))
        .route("/topics", get(handle_list_topics))
        .route("/topics/:slug", get(handle_get_topic))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Serve until `shutdown` resolves, then drain in-flight requests
pub async fn start_server<F>(listener: tokio::net::TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);

    let bind_addr = listener
        .local_addr()
        .context("Failed to obtain server bind address")?;
    info!("Starting compile server on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server error")?;

    info!("Compile server stopped");
    Ok(())
}

fn error_response(status: StatusCode, body: ErrorBody) -> Response {
    (status, Json(body)).into_response()
}

/// Handle `POST /compile`
async fn handle_compile(
    State(state): State<AppState>,
    body: Result<Json<CompileRequestBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            debug!(reason = %rejection.body_text(), "Rejecting compile request body");
            if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                return error_response(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    ErrorBody::new(SOURCE_TOO_LARGE_MESSAGE),
                );
            }
            return error_response(StatusCode::BAD_REQUEST, ErrorBody::new(INVALID_BODY_MESSAGE));
        }
    };

    match state.service.handle(body.into()).await {
        Ok(CompileResponse::Success { artifact, output }) => (
            StatusCode::OK,
            Json(CompileSuccessBody {
                wasm: artifact.payload,
                output,
            }),
        )
            .into_response(),
        Ok(CompileResponse::CompileFailure { diagnostics }) => error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            ErrorBody::new(COMPILATION_FAILED_MESSAGE).with_details(diagnostics),
        ),
        Ok(CompileResponse::InternalFailure { message }) => {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, ErrorBody::new(message))
        }
        Err(e) => {
            let status = match &e {
                RequestError::Validation(ValidationError::EmptySource) => StatusCode::BAD_REQUEST,
                RequestError::Validation(ValidationError::SourceTooLarge { .. }) => {
                    StatusCode::PAYLOAD_TOO_LARGE
                }
                RequestError::Busy => StatusCode::SERVICE_UNAVAILABLE,
            };
            warn!(status = status.as_u16(), error = ?e, "Compile request rejected");
            error_response(status, ErrorBody::new(e.to_string()))
        }
    }
}

/// Handle `GET /health`
async fn handle_health(State(state): State<AppState>) -> Json<HealthBody> {
    Json(HealthBody {
        status: "ok".to_string(),
        toolchain: state.service.toolchain_name().to_string(),
    })
}

/// Handle `GET /topics`
async fn handle_list_topics(State(state): State<AppState>) -> Json<Vec<TopicSummary>> {
    Json(state.catalog.summaries())
}

/// Handle `GET /topics/:slug`
async fn handle_get_topic(State(state): State<AppState>, Path(slug): Path<String>) -> Response {
    match state.catalog.get(&slug) {
        Some(topic) => {
            let topic = Topic {
                resources: topic.related_resources(),
                ..topic.clone()
            };
            Json(topic).into_response()
        }
        None => error_response(StatusCode::NOT_FOUND, ErrorBody::new(TOPIC_NOT_FOUND_MESSAGE)),
    }
}
