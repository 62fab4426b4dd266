//! Builds the control-plane `axum::Router` (§4.7): `/health`, `/ready`,
//! `/metrics`, `/sidecar/config/reload`, `/events`.

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use sidecar_core::config::ConfigPatch;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::errors::{EventHandlerError, ReloadHandlerError};
use crate::health::{handle_health, handle_ready};
use crate::producer::handle_events;
use crate::responses::ReloadResponse;
use crate::state::AppState;

/// Build the full control-plane router over the given shared state.
///
/// Mirrors the teacher's `create_router`: merge per-concern route groups,
/// then layer tracing/compression/CORS once over the whole thing.
pub fn create_router(state: AppState) -> Router {
    let ingress_routes = Router::new()
        .route("/events", post(handle_events))
        .layer(middleware::from_fn_with_state(state.clone(), enforce_request_timeout));

    let control_routes = Router::new()
        .route("/health", get(handle_health))
        .route("/ready", get(handle_ready))
        .route("/metrics", get(handle_metrics))
        .route("/sidecar/config/reload", post(handle_reload));

    Router::new()
        .merge(ingress_routes)
        .merge(control_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive())
                .into_inner(),
        )
        .with_state(state)
}

/// `http.request_timeout_ms` enforcement for `POST /events` (§5): "longer
/// bodies are rejected with `408`." Read from the current config snapshot
/// on every request (rather than baked into a `tower::timeout::TimeoutLayer`
/// at router-construction time) so a config reload's new value applies
/// immediately, matching §6's "batching and timeouts hot-swap on reload."
async fn enforce_request_timeout(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let timeout_ms = state.config_snapshot().http.request_timeout_ms;
    match tokio::time::timeout(Duration::from_millis(timeout_ms), next.run(request)).await {
        Ok(response) => response,
        Err(_) => EventHandlerError::Timeout {
            seconds: timeout_ms / 1000,
        }
        .into_response(),
    }
}

/// `GET /metrics` (§4.7): Prometheus text exposition.
async fn handle_metrics(State(state): State<AppState>) -> Response {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// `POST /sidecar/config/reload` (§4.7, §6, §8 scenario 6): validate a
/// partial config document, merge it onto the running snapshot, and
/// publish the result via the shared `ArcSwap`. Fields that cannot hot-swap
/// (`workers`, `queue.max_size`, `http.port`) are acknowledged in
/// `updated_fields` but the *running* config keeps their old value — they
/// only take effect on the next process start (§6 reload semantics).
async fn handle_reload(
    State(state): State<AppState>,
    Json(patch): Json<ConfigPatch>,
) -> Result<Json<ReloadResponse>, ReloadHandlerError> {
    let current = state.config_snapshot();
    let (candidate, diff) = current.merge(&patch);
    candidate
        .validate()
        .map_err(ReloadHandlerError::Invalid)?;

    state.config.store(std::sync::Arc::new(candidate));

    if diff.is_empty() {
        info!("config reload was a no-op");
    } else {
        info!(updated_fields = ?diff.updated_fields, restart_required = ?diff.restart_required, "config reloaded");
    }

    Ok(Json(ReloadResponse {
        status: "ok",
        message: "configuration updated".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        updated_fields: diff.updated_fields,
        restart_required: diff.restart_required,
    }))
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
