//! Common utilities for end-to-end tests.
//!
//! These utilities start a real sidecar instance bound to a loopback TCP
//! port and make HTTP requests against it with `reqwest`, exercising the
//! full stack (HTTP layer, worker pool, in-memory persistence) the way a
//! deployed instance would be exercised, without requiring a container
//! runtime to be available in the test environment.

use sidecar_core::config::SidecarConfig;
use sidecar_persistence::InMemoryPersistence;
use sidecar_service::Sidecar;
use std::sync::Arc;
use std::time::Duration;

/// A running sidecar instance, listening on a loopback port, torn down on
/// `Drop`.
pub struct TestServer {
    pub base_url: String,
    pub persistence: Arc<InMemoryPersistence>,
    shutdown_tx: tokio::sync::watch::Sender<bool>,
    server_handle: Option<tokio::task::JoinHandle<()>>,
    worker_handles: Vec<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with_config(SidecarConfig::default()).await
    }

    pub async fn start_with_config(mut config: SidecarConfig) -> Self {
        config.http.port = 0; // bind an ephemeral port

        let persistence = Arc::new(InMemoryPersistence::new());
        let persistence_handle: Arc<dyn sidecar_persistence::Persistence> = persistence.clone();
        let sidecar = Sidecar::new(config, persistence_handle);
        let app = sidecar_api::create_router(sidecar.state.clone());

        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
        let worker_handles = sidecar.spawn_workers(shutdown_rx.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("failed to bind loopback port");
        let addr = listener.local_addr().expect("bound listener has a local address");
        let base_url = format!("http://{addr}");

        let mut shutdown_rx_for_server = shutdown_rx;
        let server_handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx_for_server.changed().await;
                })
                .await
                .expect("server task failed");
        });

        let server = Self {
            base_url,
            persistence,
            shutdown_tx,
            server_handle: Some(server_handle),
            worker_handles,
        };

        server.wait_for_health().await;
        server
    }

    async fn wait_for_health(&self) {
        let client = http_client();
        let health_url = format!("{}/health", self.base_url);

        for _ in 0..30 {
            if let Ok(response) = client.get(&health_url).send().await {
                if response.status().is_success() || response.status().as_u16() == 503 {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        panic!("server at {} did not become reachable", self.base_url);
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.server_handle.take() {
            let _ = handle.await;
        }
        for handle in self.worker_handles.drain(..) {
            let _ = handle.await;
        }
    }
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .expect("failed to build reqwest client")
}
