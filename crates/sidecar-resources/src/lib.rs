//! # Sidecar Resources
//!
//! The resource governor (§4.6): periodically samples process CPU% and
//! RSS, publishes them as gauges via the injected `MetricsCollector`, and
//! flips a `profiling_enabled` flag off after `breach_windows` consecutive
//! over-budget samples, back on once the same number of consecutive
//! samples fall below 80% of budget.
//!
//! The breach/recovery bookkeeping is a small consecutive-count state
//! machine, the same shape as a circuit breaker's failure counter, just
//! with two independent thresholds (breach, recovery) instead of one.

use sidecar_core::monitoring::MetricsCollector;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// One CPU%/RSS reading. Implemented by `SysinfoSampler` in production and
/// by a deterministic test double in unit tests (spec §8 scenario 4).
pub trait ResourceSample: Send {
    /// Returns `(cpu_percent, memory_mb)` for the current process.
    fn sample(&mut self) -> (f64, u64);
}

/// Production sampler backed by `sysinfo`.
pub struct SysinfoSampler {
    system: sysinfo::System,
    pid: sysinfo::Pid,
}

impl SysinfoSampler {
    pub fn new() -> Self {
        let pid = sysinfo::Pid::from_u32(std::process::id());
        let mut system = sysinfo::System::new();
        system.refresh_processes(sysinfo::ProcessesToUpdate::All, true);
        Self { system, pid }
    }
}

impl Default for SysinfoSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceSample for SysinfoSampler {
    fn sample(&mut self) -> (f64, u64) {
        self.system
            .refresh_processes(sysinfo::ProcessesToUpdate::Some(&[self.pid]), true);
        match self.system.process(self.pid) {
            Some(process) => {
                let cpu_percent = process.cpu_usage() as f64;
                let memory_mb = process.memory() / (1024 * 1024);
                (cpu_percent, memory_mb)
            }
            None => (0.0, 0),
        }
    }
}

/// Budget thresholds the governor evaluates samples against.
#[derive(Debug, Clone, Copy)]
pub struct ResourceBudget {
    pub max_cpu_percent: f64,
    pub max_memory_mb: u64,
    pub breach_windows: u32,
}

impl ResourceBudget {
    fn is_over_budget(&self, cpu_percent: f64, memory_mb: u64) -> bool {
        cpu_percent > self.max_cpu_percent || memory_mb > self.max_memory_mb
    }

    /// Recovery requires both metrics under 80% of budget (§4.6).
    fn is_comfortably_under_budget(&self, cpu_percent: f64, memory_mb: u64) -> bool {
        cpu_percent < self.max_cpu_percent * 0.8 && (memory_mb as f64) < self.max_memory_mb as f64 * 0.8
    }
}

/// Tracks consecutive breach/recovery samples and flips `profiling_enabled`
/// once a full window closes in either direction.
struct BreachWindow {
    consecutive_breaches: u32,
    consecutive_recoveries: u32,
}

impl BreachWindow {
    fn new() -> Self {
        Self {
            consecutive_breaches: 0,
            consecutive_recoveries: 0,
        }
    }

    /// Returns `Some(true)` if this sample closes a breach window (disable
    /// profiling), `Some(false)` if it closes a recovery window (re-enable
    /// profiling), `None` if neither window has closed yet.
    fn observe(&mut self, budget: &ResourceBudget, cpu_percent: f64, memory_mb: u64) -> Option<bool> {
        if budget.is_over_budget(cpu_percent, memory_mb) {
            self.consecutive_breaches += 1;
            self.consecutive_recoveries = 0;
            if self.consecutive_breaches >= budget.breach_windows {
                self.consecutive_breaches = 0;
                return Some(true);
            }
        } else if budget.is_comfortably_under_budget(cpu_percent, memory_mb) {
            self.consecutive_recoveries += 1;
            self.consecutive_breaches = 0;
            if self.consecutive_recoveries >= budget.breach_windows {
                self.consecutive_recoveries = 0;
                return Some(false);
            }
        } else {
            // Neither clearly over nor comfortably under: reset both
            // counters rather than let a borderline sample count towards
            // either window.
            self.consecutive_breaches = 0;
            self.consecutive_recoveries = 0;
        }
        None
    }
}

/// Shared flag read by the rest of the pipeline to gate expensive
/// observation (payload capture, stack sampling).
#[derive(Clone)]
pub struct ProfilingFlag(Arc<AtomicBool>);

impl ProfilingFlag {
    pub fn new(initial: bool) -> Self {
        Self(Arc::new(AtomicBool::new(initial)))
    }

    pub fn is_enabled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn set(&self, enabled: bool) {
        self.0.store(enabled, Ordering::Relaxed);
    }
}

/// Runs the periodic sampling loop described in §4.6.
pub struct ResourceGovernor<S: ResourceSample> {
    sampler: S,
    budget: ResourceBudget,
    sample_interval: Duration,
    window: BreachWindow,
    profiling: ProfilingFlag,
    metrics: Arc<dyn MetricsCollector>,
}

impl<S: ResourceSample> ResourceGovernor<S> {
    pub fn new(
        sampler: S,
        budget: ResourceBudget,
        sample_interval: Duration,
        profiling: ProfilingFlag,
        metrics: Arc<dyn MetricsCollector>,
    ) -> Self {
        Self {
            sampler,
            budget,
            sample_interval,
            window: BreachWindow::new(),
            profiling,
            metrics,
        }
    }

    pub fn profiling_flag(&self) -> ProfilingFlag {
        self.profiling.clone()
    }

    /// Take one sample, update metrics, and flip `profiling_enabled` if a
    /// breach or recovery window just closed. Exposed separately from
    /// `run` so unit tests can drive the state machine deterministically.
    pub fn tick(&mut self) {
        let (cpu_percent, memory_mb) = self.sampler.sample();
        self.metrics.record_resource_sample(cpu_percent, memory_mb);

        if let Some(disable) = self.window.observe(&self.budget, cpu_percent, memory_mb) {
            self.profiling.set(!disable);
            self.metrics.record_profiling_enabled(!disable);
            if disable {
                info!(sidecar_event = "profiling_auto_disabled", cpu_percent, memory_mb, "resource budget breached");
            } else {
                info!(sidecar_event = "profiling_auto_enabled", cpu_percent, memory_mb, "resource usage recovered");
            }
        }
    }

    /// Run the sampling loop until `shutdown` fires.
    pub async fn run(mut self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.sample_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => self.tick(),
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
