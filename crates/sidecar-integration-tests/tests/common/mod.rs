//! Shared test fixtures for the sidecar integration tests.
//!
//! Each test stands up a real `Sidecar` (shared state, worker pool) wired
//! to an `InMemoryPersistence` it can inspect afterwards, and drives the
//! real `axum::Router` through `tower::ServiceExt::oneshot` rather than
//! calling handler functions directly, so these tests exercise the same
//! request path a live HTTP client would.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use sidecar_core::config::SidecarConfig;
use sidecar_persistence::{InMemoryPersistence, Persistence};
use sidecar_service::Sidecar;
use std::sync::Arc;
use tower::ServiceExt;

/// One running sidecar instance under test: the router, the worker pool
/// (if `config.workers > 0`), and a handle to the in-memory persistence
/// backend the workers write through.
pub struct Harness {
    pub sidecar: Sidecar,
    pub persistence: Arc<InMemoryPersistence>,
    shutdown_tx: tokio::sync::watch::Sender<bool>,
    worker_handles: Vec<tokio::task::JoinHandle<()>>,
}

impl Harness {
    /// Build a harness with a given config but spawn no workers (queue
    /// overflow and sampling scenarios need full control over whether
    /// anything drains the queue).
    pub fn new(config: SidecarConfig) -> Self {
        let persistence = Arc::new(InMemoryPersistence::new());
        let persistence_handle: Arc<dyn Persistence> = persistence.clone();
        let sidecar = Sidecar::new(config, persistence_handle);
        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
        let worker_handles = sidecar.spawn_workers(shutdown_rx);

        Self {
            sidecar,
            persistence,
            shutdown_tx,
            worker_handles,
        }
    }

    pub fn router(&self) -> Router {
        sidecar_api::create_router(self.sidecar.state.clone())
    }

    /// Signal shutdown and wait for every worker task to drain its batch
    /// and exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.worker_handles {
            let _ = handle.await;
        }
    }
}

/// POST a JSON body to `path` through the router and return `(status, body)`.
pub async fn post_json(router: &Router, path: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

/// GET `path` through the router and return `(status, body)`.
pub async fn get_json(router: &Router, path: &str) -> (StatusCode, Value) {
    let request = Request::builder().method("GET").uri(path).body(Body::empty()).unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

/// GET `path` through the router and return `(status, raw text body)`, for
/// the Prometheus text exposition at `/metrics`.
pub async fn get_text(router: &Router, path: &str) -> (StatusCode, String) {
    let request = Request::builder().method("GET").uri(path).body(Body::empty()).unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

pub fn session_start(run_id: &str) -> Value {
    serde_json::json!({
        "event_type": "session_start",
        "framework": "pytest",
        "run_id": run_id,
        "data": {}
    })
}

pub fn session_finish(run_id: &str, total: i64, passed: i64, failed: i64) -> Value {
    serde_json::json!({
        "event_type": "session_finish",
        "framework": "pytest",
        "run_id": run_id,
        "data": {
            "num_total_tests": total,
            "num_passed_tests": passed,
            "num_failed_tests": failed,
            "elapsed_time": 1.2
        }
    })
}

pub fn test_end(run_id: &str, test_id: &str, status: &str, elapsed_time: f64) -> Value {
    serde_json::json!({
        "event_type": "test_end",
        "framework": "pytest",
        "run_id": run_id,
        "test_id": test_id,
        "data": {
            "test_name": test_id,
            "status": status,
            "elapsed_time": elapsed_time
        }
    })
}
