//! Configuration schema for the sidecar (§6) and its hot-reload semantics.
//!
//! `SidecarConfig` is published as an immutable snapshot behind a single
//! atomic pointer (`arc_swap::ArcSwap` in `sidecar-api`); this module owns
//! the schema, validation, and the partial-merge/diff logic used by
//! `POST /sidecar/config/reload`. It has no knowledge of the atomic pointer
//! itself — that's an infrastructure concern layered on top.

use serde::{Deserialize, Serialize};

/// Top-level sidecar configuration (§6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SidecarConfig {
    pub enabled: bool,
    pub workers: u32,
    pub queue: QueueConfig,
    pub sampling: SamplingConfig,
    pub resources: ResourcesConfig,
    pub persistence: PersistenceConfig,
    pub http: HttpConfig,
    pub health: HealthConfig,
    pub shutdown: ShutdownConfig,
}

impl Default for SidecarConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            workers: 2,
            queue: QueueConfig::default(),
            sampling: SamplingConfig::default(),
            resources: ResourcesConfig::default(),
            persistence: PersistenceConfig::default(),
            http: HttpConfig::default(),
            health: HealthConfig::default(),
            shutdown: ShutdownConfig::default(),
        }
    }
}

impl SidecarConfig {
    /// Validate the configuration for internal consistency.
    ///
    /// Called once at startup and again on every `/sidecar/config/reload`
    /// before the candidate snapshot is published.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 && self.queue.max_size == 0 {
            return Err(ConfigError::Invalid {
                message: "workers and queue.max_size cannot both be zero".to_string(),
            });
        }
        if !self.queue.drop_on_full {
            return Err(ConfigError::Invalid {
                message: "queue.drop_on_full=false is reserved; tail-drop is the only supported policy".to_string(),
            });
        }
        self.sampling.validate()?;
        self.resources.validate()?;
        self.persistence.validate()?;
        Ok(())
    }

    /// Apply a partial configuration on top of `self`, returning the merged
    /// candidate along with the dotted field paths that changed
    /// (`updated_fields`) and the subset of those that require a process
    /// restart to take effect (`restart_required`), per spec §6's reload
    /// semantics table.
    pub fn merge(&self, patch: &ConfigPatch) -> (SidecarConfig, ReloadDiff) {
        let mut merged = self.clone();
        let mut diff = ReloadDiff::default();

        // workers, queue.max_size and http.port are restart-only fields
        // (§6): the patch is acknowledged in `updated_fields` and
        // `restart_required`, but the *running* config is intentionally
        // left untouched — the new value only takes effect on the next
        // process start.
        if let Some(workers) = patch.workers {
            if workers != merged.workers {
                diff.mark("workers", true);
            }
        }
        if let Some(q) = &patch.queue {
            if let Some(max_size) = q.max_size {
                if max_size != merged.queue.max_size {
                    diff.mark("queue.max_size", true);
                }
            }
        }
        if let Some(s) = &patch.sampling {
            if let Some(rates) = &s.rates {
                macro_rules! merge_rate {
                    ($field:ident, $path:literal) => {
                        if let Some(v) = rates.$field {
                            if (v - merged.sampling.rates.$field).abs() > f64::EPSILON {
                                merged.sampling.rates.$field = v;
                                diff.mark($path, false);
                            }
                        }
                    };
                }
                merge_rate!(events, "sampling.rates.events");
                merge_rate!(logs, "sampling.rates.logs");
                merge_rate!(profiling, "sampling.rates.profiling");
                merge_rate!(metrics, "sampling.rates.metrics");
            }
        }
        if let Some(r) = &patch.resources {
            if let Some(v) = r.max_cpu_percent {
                if (v - merged.resources.max_cpu_percent).abs() > f64::EPSILON {
                    merged.resources.max_cpu_percent = v;
                    diff.mark("resources.max_cpu_percent", false);
                }
            }
            if let Some(v) = r.max_memory_mb {
                if v != merged.resources.max_memory_mb {
                    merged.resources.max_memory_mb = v;
                    diff.mark("resources.max_memory_mb", false);
                }
            }
            if let Some(v) = r.sample_interval_ms {
                if v != merged.resources.sample_interval_ms {
                    merged.resources.sample_interval_ms = v;
                    diff.mark("resources.sample_interval_ms", false);
                }
            }
            if let Some(v) = r.breach_windows {
                if v != merged.resources.breach_windows {
                    merged.resources.breach_windows = v;
                    diff.mark("resources.breach_windows", false);
                }
            }
        }
        if let Some(p) = &patch.persistence {
            if let Some(v) = p.batch_size {
                if v != merged.persistence.batch_size {
                    merged.persistence.batch_size = v;
                    diff.mark("persistence.batch_size", false);
                }
            }
            if let Some(v) = p.batch_linger_ms {
                if v != merged.persistence.batch_linger_ms {
                    merged.persistence.batch_linger_ms = v;
                    diff.mark("persistence.batch_linger_ms", false);
                }
            }
            if let Some(v) = p.write_timeout_ms {
                if v != merged.persistence.write_timeout_ms {
                    merged.persistence.write_timeout_ms = v;
                    diff.mark("persistence.write_timeout_ms", false);
                }
            }
            if let Some(v) = p.keep_raw {
                if v != merged.persistence.keep_raw {
                    merged.persistence.keep_raw = v;
                    diff.mark("persistence.keep_raw", false);
                }
            }
        }
        if let Some(h) = &patch.http {
            if let Some(v) = h.port {
                if v != merged.http.port {
                    diff.mark("http.port", true);
                }
            }
            if let Some(v) = h.request_timeout_ms {
                if v != merged.http.request_timeout_ms {
                    merged.http.request_timeout_ms = v;
                    diff.mark("http.request_timeout_ms", false);
                }
            }
        }

        (merged, diff)
    }
}

/// Error returned when a configuration snapshot or reload patch fails
/// validation.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
pub enum ConfigError {
    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueueConfig {
    pub max_size: usize,
    pub drop_on_full: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_size: 5000,
            drop_on_full: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SamplingRates {
    pub events: f64,
    pub logs: f64,
    pub profiling: f64,
    pub metrics: f64,
}

impl Default for SamplingRates {
    fn default() -> Self {
        Self {
            events: 0.1,
            logs: 0.05,
            profiling: 0.01,
            metrics: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct SamplingConfig {
    pub rates: SamplingRates,
}

impl SamplingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        for (name, rate) in [
            ("events", self.rates.events),
            ("logs", self.rates.logs),
            ("profiling", self.rates.profiling),
            ("metrics", self.rates.metrics),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(ConfigError::Invalid {
                    message: format!("sampling.rates.{name} must be within [0.0, 1.0], got {rate}"),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResourcesConfig {
    pub max_cpu_percent: f64,
    pub max_memory_mb: u64,
    pub sample_interval_ms: u64,
    pub breach_windows: u32,
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            max_cpu_percent: 5.0,
            max_memory_mb: 100,
            sample_interval_ms: 1000,
            breach_windows: 3,
        }
    }
}

impl ResourcesConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.breach_windows == 0 {
            return Err(ConfigError::Invalid {
                message: "resources.breach_windows must be at least 1".to_string(),
            });
        }
        if self.sample_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                message: "resources.sample_interval_ms must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PersistenceConfig {
    pub batch_size: usize,
    pub batch_linger_ms: u64,
    pub write_timeout_ms: u64,
    pub keep_raw: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            batch_size: 64,
            batch_linger_ms: 50,
            write_timeout_ms: 2000,
            keep_raw: false,
        }
    }
}

impl PersistenceConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid {
                message: "persistence.batch_size must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8765,
            request_timeout_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HealthConfig {
    pub persistence_grace_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            persistence_grace_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShutdownConfig {
    pub drain_timeout_ms: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout_ms: 5000,
        }
    }
}

// ============================================================================
// Reload patch and diff
// ============================================================================

/// A partial configuration document, as accepted by
/// `POST /sidecar/config/reload`. Every field is optional; absent fields
/// leave the running value untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigPatch {
    pub workers: Option<u32>,
    pub queue: Option<QueuePatch>,
    pub sampling: Option<SamplingPatch>,
    pub resources: Option<ResourcesPatch>,
    pub persistence: Option<PersistencePatch>,
    pub http: Option<HttpPatch>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueuePatch {
    pub max_size: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SamplingPatch {
    pub rates: Option<SamplingRatesPatch>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SamplingRatesPatch {
    pub events: Option<f64>,
    pub logs: Option<f64>,
    pub profiling: Option<f64>,
    pub metrics: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourcesPatch {
    pub max_cpu_percent: Option<f64>,
    pub max_memory_mb: Option<u64>,
    pub sample_interval_ms: Option<u64>,
    pub breach_windows: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistencePatch {
    pub batch_size: Option<usize>,
    pub batch_linger_ms: Option<u64>,
    pub write_timeout_ms: Option<u64>,
    pub keep_raw: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpPatch {
    pub port: Option<u16>,
    pub request_timeout_ms: Option<u64>,
}

/// The result of merging a `ConfigPatch`: which dotted field paths actually
/// changed, split into those that hot-swap and those that require a
/// restart (§6 reload semantics).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReloadDiff {
    pub updated_fields: Vec<String>,
    pub restart_required: Vec<String>,
}

impl ReloadDiff {
    fn mark(&mut self, field: &str, restart_required: bool) {
        self.updated_fields.push(field.to_string());
        if restart_required {
            self.restart_required.push(field.to_string());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.updated_fields.is_empty()
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
