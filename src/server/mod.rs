//! HTTP daemon mode for `docres`.
//!
//! This module exposes a small HTTP+JSON API that mirrors the resolver
//! engine:
//!
//! - `POST /v1/resolve` accepts a `ResolveRequest` and returns a
//!   `ResolveResponse`.
//! - `POST /v1/clean` accepts a `CleanRequest` and returns a
//!   `CleanResponse`.
//! - `POST /v1/docstring/edit` accepts a `DocstringEditRequest` and
//!   returns a `DocstringEditResponse`.
//! - `GET /v1/backends` lists the registered analyzer backends.
//! - `GET /v1/health` is a simple health check endpoint.
//!
//! The server performs JSON (de)serialization, delegates to the
//! resolver, and converts errors into JSON HTTP responses.

use std::net::SocketAddr;

use anyhow::Result;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;

use crate::models::{
    BackendsResponse, CleanRequest, CleanResponse, DocstringEditRequest, DocstringEditResponse,
    ResolveRequest, ResolveResponse,
};
use crate::resolver::{self, ResolveError};

/// Simple health-check response payload.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// JSON error body returned by the API.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Error type used by HTTP handlers to map resolver failures into
/// JSON error responses.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<ResolveError> for ApiError {
    fn from(err: ResolveError) -> Self {
        if err.is_internal() {
            tracing::error!(error = %err, "resolver failed");
            ApiError::internal(err.to_string())
        } else {
            ApiError::bad_request(err.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

/// Build the Axum router for the docres HTTP API.
pub fn router() -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/backends", get(backends))
        .route("/v1/resolve", post(resolve))
        .route("/v1/clean", post(clean))
        .route("/v1/docstring/edit", post(docstring_edit))
}

/// Run the HTTP server bound to the provided socket address.
///
/// This is used by the CLI `docres serve` subcommand.
pub async fn run(addr: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve_with_listener(listener).await
}

/// Run the HTTP server using an existing `TcpListener`.
///
/// This is primarily used in tests to bind to an ephemeral port.
pub async fn serve_with_listener(listener: TcpListener) -> Result<()> {
    let app = router();
    tracing::info!(addr = ?listener.local_addr().ok(), "docres daemon listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn backends() -> Json<BackendsResponse> {
    Json(resolver::list_backends())
}

// Parsing is CPU-bound, so requests run on the blocking pool.
async fn run_blocking<T, F>(job: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ResolveError> + Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|err| ApiError::internal(format!("resolver task failed: {err}")))?
        .map_err(ApiError::from)
}

async fn resolve(Json(request): Json<ResolveRequest>) -> Result<Json<ResolveResponse>, ApiError> {
    let response = run_blocking(move || resolver::run_resolve(request)).await?;
    Ok(Json(response))
}

async fn clean(Json(request): Json<CleanRequest>) -> Result<Json<CleanResponse>, ApiError> {
    let response = run_blocking(move || resolver::run_clean(request)).await?;
    Ok(Json(response))
}

async fn docstring_edit(
    Json(request): Json<DocstringEditRequest>,
) -> Result<Json<DocstringEditResponse>, ApiError> {
    let response = run_blocking(move || resolver::run_docstring_edit(request)).await?;
    Ok(Json(response))
}
