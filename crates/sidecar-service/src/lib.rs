//! # Sidecar Service
//!
//! The binary: wiring, the worker pool, graceful shutdown, and the
//! in-process producer entry point (§2). `sidecar-api` owns the axum
//! router and `AppState`; this crate assembles the shared state, spawns
//! the worker tasks and the resource governor's sampling loop, and starts
//! the HTTP server.

pub mod config_loader;
pub mod dispatch;
pub mod worker;

use arc_swap::ArcSwap;
use sidecar_api::{AppState, ServiceMetrics};
use sidecar_core::config::SidecarConfig;
use sidecar_persistence::Persistence;
use sidecar_queue::{BoundedQueue, SharedQueue};
use sidecar_resources::{ProfilingFlag, ResourceBudget, ResourceGovernor, ResourceSample};
use std::sync::Arc;
use std::time::Duration;

/// The in-process producer entry point (§4.1a): a future in-process
/// embedder links this crate and calls `sidecar_service::producer::put`
/// directly, without going over HTTP. The implementation lives in
/// `sidecar-api` (it needs the same `AppState` the HTTP handler reads);
/// this module is the spec-named seam, not a second copy.
pub mod producer {
    pub use sidecar_api::producer::{put, PutOutcome};
}

/// Everything needed to run the service: the shared `AppState` the axum
/// router reads, plus the pieces the router doesn't own (the persistence
/// backend and the resource governor's profiling flag).
pub struct Sidecar {
    pub state: AppState,
    pub persistence: Arc<dyn Persistence>,
    pub profiling: ProfilingFlag,
}

impl Sidecar {
    /// Wire up one sidecar instance from a validated startup config.
    pub fn new(config: SidecarConfig, persistence: Arc<dyn Persistence>) -> Self {
        let metrics = Arc::new(ServiceMetrics::new().expect("metric registration cannot fail with a fresh registry"));
        let queue: SharedQueue = Arc::new(BoundedQueue::new(config.queue.max_size));
        let profiling = ProfilingFlag::new(true);
        let config = Arc::new(ArcSwap::from_pointee(config));

        let state = AppState::new(config, queue, metrics, profiling.clone());

        Self { state, persistence, profiling }
    }

    /// Spawn one tokio task per `sidecar.workers` (§5), returning their
    /// join handles so `main` can await them during shutdown.
    ///
    /// `workers=0` is a valid configuration (spec §8 scenario 2: "drain
    /// disabled") that spawns no workers at all, leaving the queue to fill
    /// and reject on overflow.
    pub fn spawn_workers(&self, shutdown: tokio::sync::watch::Receiver<bool>) -> Vec<tokio::task::JoinHandle<()>> {
        let config = self.state.config_snapshot();
        let worker_count = config.workers;

        (0..worker_count)
            .map(|_| {
                let metrics: Arc<dyn sidecar_core::monitoring::MetricsCollector> = self.state.metrics.clone();
                let ctx = worker::WorkerContext::from_config(
                    self.state.queue.clone(),
                    self.persistence.clone(),
                    metrics,
                    &config,
                );
                tokio::spawn(worker::run(ctx, shutdown.clone()))
            })
            .collect()
    }

    /// Spawn the resource governor's sampling loop (§4.6/§5).
    pub fn spawn_resource_governor<S: ResourceSample + 'static>(
        &self,
        sampler: S,
        shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        let config = self.state.config_snapshot();
        let budget = ResourceBudget {
            max_cpu_percent: config.resources.max_cpu_percent,
            max_memory_mb: config.resources.max_memory_mb,
            breach_windows: config.resources.breach_windows,
        };
        let metrics: Arc<dyn sidecar_core::monitoring::MetricsCollector> = self.state.metrics.clone();
        let governor = ResourceGovernor::new(
            sampler,
            budget,
            Duration::from_millis(config.resources.sample_interval_ms),
            self.profiling.clone(),
            metrics,
        );
        tokio::spawn(governor.run(shutdown))
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
