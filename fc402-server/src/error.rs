//! Error responses of the demo API.

use std::any::Any;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors a route can answer with.
///
/// Every variant renders as `{"error": "<message>"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The stream id contains characters outside `[a-z0-9-]`.
    #[error("Invalid stream id")]
    InvalidStreamId,

    /// No stream with that id is in the catalog.
    #[error("Stream not found")]
    StreamNotFound,

    /// Anything unexpected. Details are logged, never sent.
    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    /// HTTP status of the error.
    #[must_use]
    pub const fn status(self) -> StatusCode {
        match self {
            Self::InvalidStreamId => StatusCode::BAD_REQUEST,
            Self::StreamNotFound => StatusCode::NOT_FOUND,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

/// Turns a handler panic into `500 {"error":"Internal server error"}`.
#[allow(clippy::needless_pass_by_value)] // signature required by CatchPanicLayer
pub fn internal_error(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_default();
    tracing::error!(%detail, "Server error");
    ApiError::Internal.into_response()
}
