//! # Sidecar Persistence
//!
//! The batched, append-only writer to the fixed relational schema (§4.5,
//! §6): `session`, `test_execution`, `step_execution`, `http_call`. Writes
//! are grouped into `PersistenceRecord` batches by the Worker Pool and
//! committed all-or-nothing per batch.

use async_trait::async_trait;
use sidecar_core::model::{HttpCall, StepExecution, TestExecution};
use sidecar_core::Timestamp;

pub mod batch;
pub mod postgres;

pub use batch::{BatchPolicy, RetryPolicy};
pub use postgres::PgPersistence;

/// One unit of work handed to a `Persistence` implementation. `session_*`
/// variants carry just the fields needed for the upsert/update described
/// in §4.5 rather than a full `Session`, since a `session_start` never has
/// `finished_at` and a `session_finish` only updates aggregates.
#[derive(Debug, Clone)]
pub enum PersistenceRecord {
    SessionStart {
        run_id: String,
        framework: String,
        product_name: Option<String>,
        application_version: Option<String>,
        environment: Option<String>,
        started_at: Timestamp,
    },
    SessionFinish {
        run_id: String,
        finished_at: Timestamp,
        total_tests: Option<i64>,
        passed: Option<i64>,
        failed: Option<i64>,
    },
    TestExecution(TestExecution),
    StepExecution(StepExecution),
    HttpCall(HttpCall),
}

impl PersistenceRecord {
    /// Label used for metrics and logging (`operation` tag in §4.8).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionStart { .. } => "session_start",
            Self::SessionFinish { .. } => "session_finish",
            Self::TestExecution(_) => "test_execution",
            Self::StepExecution(_) => "step_execution",
            Self::HttpCall(_) => "http_call",
        }
    }
}

/// Error taxonomy for persistence operations (§7): a write either succeeds,
/// fails transiently (worth one retry), fails fatally (batch discarded),
/// or hits the idempotence constraint (swallowed and counted separately,
/// not an error at all from the caller's perspective).
#[derive(Debug, Clone, thiserror::Error)]
pub enum PersistenceError {
    #[error("transient persistence error: {message}")]
    Transient { message: String },

    #[error("persistence batch failed: {message}")]
    Fatal { message: String },
}

impl PersistenceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// Outcome of writing one batch: how many records landed, and how many
/// were rejected as duplicates under the `(test_id, run_id, executed_at)`
/// unique constraint (§4.5) — duplicates are not failures, they're counted
/// under `events_dropped{reason="duplicate"}` by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub written: usize,
    pub duplicates: usize,
}

/// Persists batches of records and reports backend health for `/health`.
#[async_trait]
pub trait Persistence: Send + Sync {
    async fn write_batch(&self, records: &[PersistenceRecord]) -> Result<BatchOutcome, PersistenceError>;

    /// Used by the Control-Plane HTTP health check (§4.7): `/health`
    /// transitions to `down` once this has failed continuously for
    /// `health.persistence_grace_ms`.
    async fn health_check(&self) -> Result<(), PersistenceError>;
}

/// In-memory `Persistence` used by integration tests and by
/// `sidecar-service` in the fail-open persistence-failure scenario (§8
/// scenario 5), where it can be configured to fail every write.
pub struct InMemoryPersistence {
    state: tokio::sync::Mutex<InMemoryState>,
}

#[derive(Default)]
struct InMemoryState {
    records: Vec<PersistenceRecord>,
    seen_keys: std::collections::HashSet<(String, String, String)>,
    fail_every_write: bool,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self {
            state: tokio::sync::Mutex::new(InMemoryState::default()),
        }
    }

    /// Make every subsequent `write_batch` call fail with a transient
    /// error, for exercising the fail-open path in tests.
    pub async fn fail_every_write(&self, fail: bool) {
        self.state.lock().await.fail_every_write = fail;
    }

    pub async fn recorded(&self) -> Vec<PersistenceRecord> {
        self.state.lock().await.records.clone()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.records.len()
    }
}

impl Default for InMemoryPersistence {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Persistence for InMemoryPersistence {
    async fn write_batch(&self, records: &[PersistenceRecord]) -> Result<BatchOutcome, PersistenceError> {
        let mut state = self.state.lock().await;
        if state.fail_every_write {
            return Err(PersistenceError::Transient {
                message: "injected failure".to_string(),
            });
        }

        let mut outcome = BatchOutcome::default();
        for record in records {
            if let PersistenceRecord::TestExecution(test) = record {
                let key = (
                    test.test_id.clone(),
                    test.run_id.clone(),
                    test.executed_at.to_rfc3339(),
                );
                if !state.seen_keys.insert(key) {
                    outcome.duplicates += 1;
                    continue;
                }
            }
            state.records.push(record.clone());
            outcome.written += 1;
        }
        Ok(outcome)
    }

    async fn health_check(&self) -> Result<(), PersistenceError> {
        if self.state.lock().await.fail_every_write {
            return Err(PersistenceError::Transient {
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
