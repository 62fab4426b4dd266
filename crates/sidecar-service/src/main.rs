//! # Sidecar Service
//!
//! Binary entry point for the test-observability sidecar.
//!
//! This executable:
//! - Loads and validates configuration from compiled defaults plus the
//!   `SIDECAR_` environment layer.
//! - Initializes structured logging.
//! - Builds the Postgres persistence backend (or an in-memory fallback when
//!   `DATABASE_URL` is unset, for local development).
//! - Wires the shared `Sidecar` state, spawns the worker pool and the
//!   resource governor, then starts the HTTP server with graceful shutdown.

use anyhow::{Context, Result};
use sidecar_api::create_router;
use sidecar_persistence::{InMemoryPersistence, PgPersistence, Persistence};
use sidecar_resources::SysinfoSampler;
use sidecar_service::{config_loader, Sidecar};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sidecar_service=info,sidecar_api=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("starting test-observability sidecar");

    let config = config_loader::load().map_err(|e| {
        error!(error = %e, "invalid startup configuration");
        anyhow::Error::new(e)
    })?;

    let persistence: Arc<dyn Persistence> = match std::env::var("DATABASE_URL") {
        Ok(url) => {
            info!("connecting to postgres persistence backend");
            let max_connections = config.workers.max(1) + 1;
            Arc::new(
                PgPersistence::connect(&url, max_connections)
                    .await
                    .context("failed to connect to the postgres persistence backend")?,
            )
        }
        Err(_) => {
            warn!("DATABASE_URL not set, falling back to in-memory persistence (development only)");
            Arc::new(InMemoryPersistence::new())
        }
    };

    let host = config.http.host.clone();
    let port = config.http.port;

    let sidecar = Sidecar::new(config, persistence);
    let app = create_router(sidecar.state.clone());

    let drain_timeout =
        std::time::Duration::from_millis(sidecar.state.config_snapshot().shutdown.drain_timeout_ms);

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let worker_handles = sidecar.spawn_workers(shutdown_rx.clone());
    let governor_handle = sidecar.spawn_resource_governor(SysinfoSampler::new(), shutdown_rx.clone());

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind http listener on {addr}"))?;
    info!(%addr, "http server listening");

    let shutdown_signal = async move {
        let ctrl_c = async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install Ctrl+C signal handler");
        };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("received SIGINT, initiating graceful shutdown"),
            _ = terminate => info!("received SIGTERM, initiating graceful shutdown"),
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("http server exited with an error")?;

    info!("http server stopped, draining workers");
    let _ = shutdown_tx.send(true);

    // §4.4: flush outstanding batches "best effort with a
    // shutdown.drain_timeout_ms" — a worker stuck on a hung persistence
    // call must not block process exit forever.
    let drain = async {
        for handle in worker_handles {
            let _ = handle.await;
        }
    };
    if tokio::time::timeout(drain_timeout, drain).await.is_err() {
        warn!(
            drain_timeout_ms = drain_timeout.as_millis() as u64,
            "worker drain exceeded shutdown.drain_timeout_ms, proceeding with shutdown"
        );
    }
    let _ = governor_handle.await;

    info!("sidecar shutdown complete");
    Ok(())
}
