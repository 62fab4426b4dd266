//! # Sidecar API
//!
//! The control-plane HTTP surface (§4.7): `POST /events`, `GET /health`,
//! `GET /ready`, `GET /metrics`, `POST /sidecar/config/reload`. This crate
//! owns the axum router and the Prometheus-backed `MetricsCollector`
//! implementation; it does not own the worker pool or the resource
//! governor's sampling loop — those are wired up by `sidecar-service` and
//! reach into the same `AppState` the router reads.

pub mod errors;
pub mod health;
pub mod metrics;
pub mod producer;
pub mod responses;
pub mod router;
pub mod state;

pub use errors::{EventHandlerError, ReloadHandlerError};
pub use metrics::ServiceMetrics;
pub use producer::{put, PutOutcome};
pub use router::create_router;
pub use state::AppState;
