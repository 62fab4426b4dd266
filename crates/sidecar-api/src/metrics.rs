//! Prometheus-backed implementation of `sidecar_core::monitoring::MetricsCollector`,
//! plus the bookkeeping `/health` needs that a Prometheus counter can't answer
//! on its own: errors in the trailing one-minute window, and how long
//! persistence has been unreachable.
//!
//! Metrics are registered into a private `Registry` rather than the process
//! default: every `ServiceMetrics::new()` (one per test, one per service
//! instance) needs its own namespace, and the default registry is a global
//! that would collide on the second construction.

use prometheus::{Encoder, Gauge, Histogram, IntCounter, IntCounterVec, IntGauge, Registry, TextEncoder};
use sidecar_core::monitoring::MetricsCollector;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub struct ServiceMetrics {
    registry: Registry,

    pub events_queued: IntCounter,
    pub events_processed: IntCounter,
    pub events_dropped: IntCounterVec,
    pub events_sampled: IntCounter,
    pub errors_total: IntCounterVec,

    pub queue_size: IntGauge,
    pub queue_utilization: Gauge,
    pub cpu_usage: Gauge,
    pub memory_usage: IntGauge,
    pub profiling_enabled: IntGauge,

    pub event_processing_duration_ms: Histogram,
    pub persistence_batch_size: Histogram,

    // Not part of the Prometheus exposition: feeds `/health`'s windowed
    // error-rate and persistence-reachability thresholds (§4.7).
    error_timestamps: Mutex<VecDeque<Instant>>,
    persistence_unreachable_since: Mutex<Option<Instant>>,
    last_resource_sample: Mutex<(f64, u64)>,

    // `IntCounterVec` has no cheap "sum across all label values" accessor,
    // and `/health`'s queue block (spec §6) wants one plain dropped-event
    // total regardless of reason. Tracked alongside the labeled Prometheus
    // series rather than replacing it.
    dropped_total: AtomicU64,
}

impl ServiceMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let events_queued = IntCounter::new(
            "sidecar_events_queued",
            "Total events accepted onto the bounded queue",
        )?;
        let events_processed = IntCounter::new(
            "sidecar_events_processed",
            "Total events persisted by the worker pool",
        )?;
        let events_dropped = IntCounterVec::new(
            prometheus::Opts::new("sidecar_events_dropped", "Total events dropped, by reason"),
            &["reason"],
        )?;
        let events_sampled = IntCounter::new(
            "sidecar_events_sampled",
            "Total events discarded by the sampler before enqueue",
        )?;
        let errors_total = IntCounterVec::new(
            prometheus::Opts::new(
                "sidecar_errors_total",
                "Total errors caught by the fail-open wrapper, by operation",
            ),
            &["operation"],
        )?;

        let queue_size = IntGauge::new("sidecar_queue_size", "Current queue depth")?;
        let queue_utilization = Gauge::new(
            "sidecar_queue_utilization",
            "Current queue depth as a fraction of max_size",
        )?;
        let cpu_usage = Gauge::new("sidecar_cpu_usage", "Last sampled process CPU percent")?;
        let memory_usage = IntGauge::new(
            "sidecar_memory_usage",
            "Last sampled process RSS, in megabytes",
        )?;
        let profiling_enabled = IntGauge::new(
            "sidecar_profiling_enabled",
            "1 when profiling is enabled, 0 when disabled by the resource governor",
        )?;

        let event_processing_duration_ms = Histogram::with_opts(
            prometheus::HistogramOpts::new(
                "sidecar_event_processing_duration_ms",
                "Time from dequeue to persisted (or discarded), in milliseconds",
            )
            .buckets(vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0]),
        )?;
        let persistence_batch_size = Histogram::with_opts(
            prometheus::HistogramOpts::new(
                "sidecar_persistence_batch_size",
                "Number of records committed per persistence batch",
            )
            .buckets(vec![1.0, 8.0, 16.0, 32.0, 64.0, 128.0, 256.0]),
        )?;

        registry.register(Box::new(events_queued.clone()))?;
        registry.register(Box::new(events_processed.clone()))?;
        registry.register(Box::new(events_dropped.clone()))?;
        registry.register(Box::new(events_sampled.clone()))?;
        registry.register(Box::new(errors_total.clone()))?;
        registry.register(Box::new(queue_size.clone()))?;
        registry.register(Box::new(queue_utilization.clone()))?;
        registry.register(Box::new(cpu_usage.clone()))?;
        registry.register(Box::new(memory_usage.clone()))?;
        registry.register(Box::new(profiling_enabled.clone()))?;
        registry.register(Box::new(event_processing_duration_ms.clone()))?;
        registry.register(Box::new(persistence_batch_size.clone()))?;

        Ok(Self {
            registry,
            events_queued,
            events_processed,
            events_dropped,
            events_sampled,
            errors_total,
            queue_size,
            queue_utilization,
            cpu_usage,
            memory_usage,
            profiling_enabled,
            event_processing_duration_ms,
            persistence_batch_size,
            error_timestamps: Mutex::new(VecDeque::new()),
            persistence_unreachable_since: Mutex::new(None),
            last_resource_sample: Mutex::new((0.0, 0)),
            dropped_total: AtomicU64::new(0),
        })
    }

    /// Cumulative `events_dropped`, across every `reason` label (§6
    /// `/health` body: `queue.dropped_events`).
    pub fn dropped_total(&self) -> u64 {
        self.dropped_total.load(Ordering::Relaxed)
    }

    pub fn events_queued_total(&self) -> u64 {
        self.events_queued.get() as u64
    }

    pub fn events_processed_total(&self) -> u64 {
        self.events_processed.get() as u64
    }

    /// All-time error count (§6 `/health` body's `metrics.errors_total`),
    /// distinct from `errors_last_minute`'s windowed count used for the
    /// status thresholds in §4.7.
    pub fn errors_total_all_time(&self) -> u64 {
        self.errors_total
            .collect()
            .first()
            .map(|family| family.get_metric().iter().map(|m| m.get_counter().get_value() as u64).sum())
            .unwrap_or(0)
    }

    /// Render the current snapshot as Prometheus text exposition
    /// (`text/plain; version=0.0.4`), per §4.7.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// True once persistence has failed continuously for at least `grace`.
    pub fn persistence_down_for(&self, grace: Duration) -> bool {
        match *self.persistence_unreachable_since.lock().unwrap() {
            Some(since) => since.elapsed() >= grace,
            None => false,
        }
    }

    /// Number of `record_error` calls in the trailing 60 seconds, pruning
    /// anything older as a side effect.
    pub fn errors_last_minute(&self) -> u64 {
        let mut timestamps = self.error_timestamps.lock().unwrap();
        let cutoff = Instant::now() - Duration::from_secs(60);
        while timestamps.front().is_some_and(|t| *t < cutoff) {
            timestamps.pop_front();
        }
        timestamps.len() as u64
    }

    pub fn last_resource_sample(&self) -> (f64, u64) {
        *self.last_resource_sample.lock().unwrap()
    }
}

impl MetricsCollector for ServiceMetrics {
    fn record_event_queued(&self) {
        self.events_queued.inc();
    }

    fn record_event_processed(&self, duration: Duration) {
        self.events_processed.inc();
        self.event_processing_duration_ms
            .observe(duration.as_secs_f64() * 1000.0);
    }

    fn record_event_dropped(&self, reason: &str) {
        self.events_dropped.with_label_values(&[reason]).inc();
        self.dropped_total.fetch_add(1, Ordering::Relaxed);
    }

    fn record_event_sampled(&self) {
        self.events_sampled.inc();
    }

    fn record_error(&self, operation: &str) {
        self.errors_total.with_label_values(&[operation]).inc();
        self.error_timestamps.lock().unwrap().push_back(Instant::now());
    }

    fn record_queue_depth(&self, size: usize, utilization: f64) {
        self.queue_size.set(size as i64);
        self.queue_utilization.set(utilization);
    }

    fn record_resource_sample(&self, cpu_percent: f64, memory_mb: u64) {
        self.cpu_usage.set(cpu_percent);
        self.memory_usage.set(memory_mb as i64);
        *self.last_resource_sample.lock().unwrap() = (cpu_percent, memory_mb);
    }

    fn record_profiling_enabled(&self, enabled: bool) {
        self.profiling_enabled.set(if enabled { 1 } else { 0 });
    }

    fn record_persistence_batch(&self, batch_size: usize, duration: Duration) {
        self.persistence_batch_size.observe(batch_size as f64);
        let _ = duration;
    }

    /// Record the outcome of a persistence attempt so `/health` can detect
    /// "unreachable for `health.persistence_grace_ms`" (§4.7, §7).
    fn record_persistence_outcome(&self, success: bool) {
        let mut since = self.persistence_unreachable_since.lock().unwrap();
        if success {
            *since = None;
        } else if since.is_none() {
            *since = Some(Instant::now());
        }
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
