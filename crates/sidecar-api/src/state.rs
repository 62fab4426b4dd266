//! Shared application state handed to every axum handler.
//!
//! A single `AppState` is cloned into each request; every field is an `Arc`
//! (or `Arc`-backed) handle so cloning is cheap and every handler observes
//! the same live queue, config snapshot, and metrics registry as the worker
//! pool and resource governor running alongside the HTTP server.

use arc_swap::ArcSwap;
use sidecar_core::SidecarConfig;
use sidecar_queue::SharedQueue;
use sidecar_resources::ProfilingFlag;
use std::sync::Arc;

use crate::metrics::ServiceMetrics;

/// Shared, cloneable handle passed to `axum::Router::with_state`.
///
/// `config` is the single writer lock described in spec.md §3 ("Config is
/// shared-read by all components; writes are confined to the Config
/// component under a single writer lock"): `POST /sidecar/config/reload`
/// validates a patch then swaps the pointer; every other reader takes an
/// uncontended `load()`. Persistence reachability doesn't need its own
/// field here: the worker pool feeds outcomes into `metrics` via
/// `record_persistence_outcome`, and `/health` reads that.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ArcSwap<SidecarConfig>>,
    pub queue: SharedQueue,
    pub metrics: Arc<ServiceMetrics>,
    pub profiling: ProfilingFlag,
}

impl AppState {
    pub fn new(
        config: Arc<ArcSwap<SidecarConfig>>,
        queue: SharedQueue,
        metrics: Arc<ServiceMetrics>,
        profiling: ProfilingFlag,
    ) -> Self {
        Self {
            config,
            queue,
            metrics,
            profiling,
        }
    }

    pub fn config_snapshot(&self) -> Arc<SidecarConfig> {
        self.config.load_full()
    }
}
