//! `GET /health` and `GET /ready` (§4.7): pure status computation over the
//! current queue/metrics/resource snapshot, wrapped by thin axum handlers.
//!
//! The thresholds are kept as free functions (`classify_health`,
//! `is_ready`) rather than inlined in the handlers so the boundary
//! scenarios in spec.md §8 can be driven directly without standing up a
//! router.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::responses::{HealthResponse, HealthStatus, MetricsSnapshot, QueueHealth, ReadinessResponse, ResourceHealth};
use crate::state::AppState;

/// Inputs to the `/health` status classification, gathered once per request
/// so the thresholds can be unit-tested without a live `AppState`.
#[derive(Debug, Clone, Copy)]
pub struct HealthInputs {
    pub queue_utilization: f64,
    pub errors_last_1m: u64,
    pub resource_breach: bool,
    pub persistence_down: bool,
}

/// Classify overall health per the three-way threshold table in spec.md
/// §4.7.
pub fn classify_health(inputs: HealthInputs) -> HealthStatus {
    if inputs.queue_utilization >= 0.95 || inputs.errors_last_1m > 50 || inputs.persistence_down {
        return HealthStatus::Down;
    }
    if inputs.queue_utilization >= 0.80 || inputs.errors_last_1m >= 10 || inputs.resource_breach {
        return HealthStatus::Degraded;
    }
    HealthStatus::Ok
}

/// `/ready` is strictly narrower than `/health`: enabled AND
/// `queue_utilization < 0.90` (spec.md §4.7).
pub fn is_ready(enabled: bool, queue_utilization: f64) -> bool {
    enabled && queue_utilization < 0.90
}

#[tracing::instrument(skip(state))]
pub async fn handle_health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let config = state.config_snapshot();
    let queue_size = state.queue.len().await;
    let max_size = state.queue.capacity();
    let queue_utilization = state.queue.utilization().await;

    let (cpu_percent, memory_mb) = state.metrics.last_resource_sample();
    let cpu_over_budget = cpu_percent > config.resources.max_cpu_percent;
    let memory_over_budget = memory_mb > config.resources.max_memory_mb;
    let persistence_down = state
        .metrics
        .persistence_down_for(std::time::Duration::from_millis(config.health.persistence_grace_ms));

    let status = classify_health(HealthInputs {
        queue_utilization,
        errors_last_1m: state.metrics.errors_last_minute(),
        resource_breach: cpu_over_budget || memory_over_budget,
        persistence_down,
    });

    let response = HealthResponse {
        status,
        timestamp: chrono::Utc::now().to_rfc3339(),
        queue: QueueHealth {
            size: queue_size,
            max_size,
            utilization: queue_utilization,
            dropped_events: state.metrics.dropped_total(),
        },
        resources: ResourceHealth {
            cpu_percent,
            memory_mb,
            cpu_over_budget,
            memory_over_budget,
        },
        metrics: MetricsSnapshot {
            events_queued: state.metrics.events_queued_total(),
            events_processed: state.metrics.events_processed_total(),
            events_dropped: state.metrics.dropped_total(),
            errors_total: state.metrics.errors_total_all_time(),
        },
    };

    let http_status = match status {
        HealthStatus::Ok | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Down => StatusCode::SERVICE_UNAVAILABLE,
    };

    (http_status, Json(response))
}

#[tracing::instrument(skip(state))]
pub async fn handle_ready(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let config = state.config_snapshot();
    let queue_utilization = state.queue.utilization().await;
    let ready = is_ready(config.enabled, queue_utilization);

    let response = ReadinessResponse {
        ready,
        timestamp: chrono::Utc::now().to_rfc3339(),
        queue_utilization,
        enabled: config.enabled,
    };

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
