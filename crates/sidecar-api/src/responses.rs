//! JSON response bodies for the control-plane endpoints (spec.md §6).

use serde::{Deserialize, Serialize};

/// `202` body for a successfully enqueued `POST /events`.
#[derive(Debug, Serialize)]
pub struct EventAcceptedResponse {
    pub queued: bool,
}

impl Default for EventAcceptedResponse {
    fn default() -> Self {
        Self { queued: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
    Down,
}

#[derive(Debug, Serialize)]
pub struct QueueHealth {
    pub size: usize,
    pub max_size: usize,
    pub utilization: f64,
    pub dropped_events: u64,
}

#[derive(Debug, Serialize)]
pub struct ResourceHealth {
    pub cpu_percent: f64,
    pub memory_mb: u64,
    pub cpu_over_budget: bool,
    pub memory_over_budget: bool,
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub events_queued: u64,
    pub events_processed: u64,
    pub events_dropped: u64,
    pub errors_total: u64,
}

/// `GET /health` body (spec.md §4.7/§6).
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub timestamp: String,
    pub queue: QueueHealth,
    pub resources: ResourceHealth,
    pub metrics: MetricsSnapshot,
}

/// `GET /ready` body (spec.md §6).
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub timestamp: String,
    pub queue_utilization: f64,
    pub enabled: bool,
}

/// `POST /sidecar/config/reload` success body (spec.md §6/§8 scenario 6).
#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub status: &'static str,
    pub message: String,
    pub timestamp: String,
    pub updated_fields: Vec<String>,
    pub restart_required: Vec<String>,
}

#[cfg(test)]
#[path = "responses_tests.rs"]
mod tests;
