//! The Worker Pool (§4.4): one task per configured worker, each draining
//! the shared queue, dispatching events to `PersistenceRecord`s, and
//! committing them in batches bounded by size or linger time, whichever
//! comes first.
//!
//! A failed batch is retried exactly once (`RetryPolicy::default`, §4.4)
//! before being discarded; the dispatch step runs through the Fail-Open
//! Wrapper so a panic or unexpected error turning an event into a record
//! never takes a worker task down.

use sidecar_core::config::SidecarConfig;
use sidecar_core::fail_open::fail_open;
use sidecar_core::monitoring::MetricsCollector;
use sidecar_persistence::batch::{BatchPolicy, RetryPolicy};
use sidecar_persistence::{Persistence, PersistenceRecord};
use sidecar_queue::SharedQueue;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::dispatch::{dispatch, Dispatch};

/// Everything one worker task needs, cloned cheaply (every field is an
/// `Arc` or `Copy`) into its own `tokio::spawn`.
#[derive(Clone)]
pub struct WorkerContext {
    pub queue: SharedQueue,
    pub persistence: Arc<dyn Persistence>,
    pub metrics: Arc<dyn MetricsCollector>,
    pub batch_policy: BatchPolicy,
    pub retry_policy: RetryPolicy,
    pub keep_raw: bool,
}

impl WorkerContext {
    pub fn from_config(
        queue: SharedQueue,
        persistence: Arc<dyn Persistence>,
        metrics: Arc<dyn MetricsCollector>,
        config: &SidecarConfig,
    ) -> Self {
        Self {
            queue,
            persistence,
            metrics,
            batch_policy: BatchPolicy::new(config.persistence.batch_size, config.persistence.batch_linger_ms),
            retry_policy: RetryPolicy::default(),
            keep_raw: config.persistence.keep_raw,
        }
    }
}

/// Run one worker's loop until `shutdown` fires. Drains whatever is left
/// in its in-flight batch before returning, so a graceful shutdown doesn't
/// drop already-dequeued events.
pub async fn run(ctx: WorkerContext, mut shutdown: tokio::sync::watch::Receiver<bool>) {
    let mut batch: Vec<PersistenceRecord> = Vec::with_capacity(ctx.batch_policy.batch_size);
    let mut batch_opened_at = Instant::now();

    loop {
        let poll_timeout = Duration::from_millis(50);
        tokio::select! {
            event = ctx.queue.get(poll_timeout) => {
                if let Some(event) = event {
                    let keep_raw = ctx.keep_raw;
                    let outcome = fail_open("dispatch", ctx.metrics.as_ref(), move || {
                        Ok::<_, std::convert::Infallible>(dispatch(event, keep_raw))
                    });
                    match outcome.into_option() {
                        Some(Dispatch::Record(record)) => batch.push(record),
                        Some(Dispatch::Consumed) => ctx.metrics.record_event_processed(Duration::ZERO),
                        None => {}
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    flush(&ctx, &mut batch).await;
                    return;
                }
            }
        }

        let batch_full = batch.len() >= ctx.batch_policy.batch_size;
        let batch_lingered = !batch.is_empty() && batch_opened_at.elapsed() >= ctx.batch_policy.batch_linger;
        if batch_full || batch_lingered {
            flush(&ctx, &mut batch).await;
            batch_opened_at = Instant::now();
        }
    }
}

async fn flush(ctx: &WorkerContext, batch: &mut Vec<PersistenceRecord>) {
    if batch.is_empty() {
        return;
    }
    let records: Vec<PersistenceRecord> = batch.drain(..).collect();
    commit(ctx, records).await;
}

async fn commit(ctx: &WorkerContext, records: Vec<PersistenceRecord>) {
    let started = Instant::now();
    let mut attempt = 0;

    loop {
        match ctx.persistence.write_batch(&records).await {
            Ok(outcome) => {
                ctx.metrics.record_persistence_outcome(true);
                ctx.metrics.record_persistence_batch(outcome.written, started.elapsed());
                for _ in 0..outcome.written {
                    ctx.metrics.record_event_processed(started.elapsed());
                }
                for _ in 0..outcome.duplicates {
                    ctx.metrics.record_event_dropped("duplicate");
                }
                return;
            }
            Err(error) if error.is_transient() && ctx.retry_policy.should_retry(attempt) => {
                let delay = ctx.retry_policy.calculate_delay(attempt);
                warn!(attempt, delay_ms = delay.as_millis() as u64, error = %error, "retrying persistence batch");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => {
                ctx.metrics.record_persistence_outcome(false);
                // §4.4: "the batch is discarded and errors_total is
                // incremented by the batch size" — one record per dropped
                // event, not one per batch, so errors_last_minute (which
                // /health's degraded/down thresholds key off) reflects the
                // true number of events lost.
                for _ in 0..records.len() {
                    ctx.metrics.record_error("persist");
                    ctx.metrics.record_event_dropped("persistence_failed");
                }
                info!(batch_size = records.len(), error = %error, "discarding batch after exhausting retries");
                return;
            }
        }
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
