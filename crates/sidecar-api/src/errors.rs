//! HTTP-facing error types: the precise status-code mapping spec.md §6/§7
//! requires for `POST /events` and `POST /sidecar/config/reload`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use sidecar_core::config::ConfigError;
use sidecar_core::event::EventValidationError;
use sidecar_queue::QueueFullError;
use tracing::warn;

/// Everything that can go wrong handling `POST /events`, mapped onto the
/// status codes spec.md §4.1/§6 specify: `400` on invalid, `429` on
/// queue-full, `408` on a body that outran `http.request_timeout_ms`.
#[derive(Debug, thiserror::Error)]
pub enum EventHandlerError {
    #[error("invalid event: {0}")]
    Invalid(#[from] EventValidationError),

    #[error("queue is full")]
    QueueFull(#[from] QueueFullError),

    #[error("request timed out after {seconds}s")]
    Timeout { seconds: u64 },
}

impl IntoResponse for EventHandlerError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::Invalid(detail) => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "reason": "invalid", "detail": detail.to_string() }),
            ),
            Self::QueueFull(_) => (
                StatusCode::TOO_MANY_REQUESTS,
                serde_json::json!({ "reason": "queue_full" }),
            ),
            Self::Timeout { seconds } => {
                warn!(timeout_seconds = seconds, "event submission timed out");
                (
                    StatusCode::REQUEST_TIMEOUT,
                    serde_json::json!({ "reason": "timeout" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

/// Errors surfaced by `POST /sidecar/config/reload`: `400` on a patch that
/// fails validation, `500` if applying a validated patch still fails for an
/// internal reason (spec.md §4.7).
#[derive(Debug, thiserror::Error)]
pub enum ReloadHandlerError {
    #[error("invalid configuration: {0}")]
    Invalid(#[from] ConfigError),

    #[error("internal error applying configuration: {message}")]
    Internal { message: String },
}

impl IntoResponse for ReloadHandlerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Invalid(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            Self::Internal { message } => {
                tracing::error!(error = %message, "config reload failed internally");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error applying configuration".to_string(),
                )
            }
        };
        let body = serde_json::json!({
            "status": "error",
            "message": message,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;
