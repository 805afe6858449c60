//! HTTP endpoint surface for Driveloft.
//!
//! Exposes the engine's user-invoked operations as an axum router. The host
//! (or the standalone binary) nests the router under its own prefix; serve
//! locators are written against `/api/driveloft`, so that prefix keeps
//! proxied links resolvable without configuration.

pub mod handlers;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;

use driveloft_common::Error;
use driveloft_offload::OffloadEngine;

/// Shared state behind every handler.
#[derive(Clone)]
pub struct ApiState {
    /// The lifecycle engine.
    pub engine: Arc<OffloadEngine>,
}

/// Build the endpoint router.
pub fn router(engine: Arc<OffloadEngine>) -> Router {
    Router::new()
        .route("/ping", get(handlers::ping))
        .route("/settings", get(handlers::settings))
        .route("/test_connection", get(handlers::test_connection))
        .route("/serve_file", get(handlers::serve_file))
        .route("/migrate", post(handlers::migrate))
        .route("/files/info", get(handlers::file_info))
        .route("/authorize", post(handlers::authorize))
        .with_state(ApiState { engine })
}

/// Error wrapper mapping the common error taxonomy onto responses.
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(inner: Error) -> Self {
        Self(inner)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Config(_) | Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::Authentication(_) => StatusCode::UNAUTHORIZED,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Network(_) => StatusCode::BAD_GATEWAY,
            Error::Io(_) | Error::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(serde_json::json!({ "message": self.0.to_string() }));
        (status, body).into_response()
    }
}
