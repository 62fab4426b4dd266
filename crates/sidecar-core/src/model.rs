//! Persisted-entity model: the four tables the core writes to (§6).

use crate::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a single test execution, as reported on `test_end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
    Aborted,
    Error,
}

impl TestStatus {
    /// Map the wire-level status tokens (`PASS`/`FAIL`/...) used in event
    /// payloads (§6) onto the persisted enum.
    pub fn from_wire(value: &str) -> Option<Self> {
        Some(match value.to_ascii_uppercase().as_str() {
            "PASS" => Self::Passed,
            "FAIL" => Self::Failed,
            "SKIP" => Self::Skipped,
            "ABORT" => Self::Aborted,
            "ERROR" => Self::Error,
            _ => return None,
        })
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Aborted => "aborted",
            Self::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Logical test-run container. Opened by `session_start`, closed by
/// `session_finish`. May remain open (`finished_at = None`) if the producer
/// never sends a matching finish event; the core accepts this as normal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub run_id: String,
    pub framework: String,
    pub product_name: Option<String>,
    pub application_version: Option<String>,
    pub environment: Option<String>,
    pub started_at: Timestamp,
    pub finished_at: Option<Timestamp>,
    pub total_tests: Option<i64>,
    pub passed: Option<i64>,
    pub failed: Option<i64>,
}

/// One append-only row per `test_end` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestExecution {
    pub test_id: String,
    pub test_name: String,
    pub framework: String,
    pub status: TestStatus,
    pub duration_ms: Option<i64>,
    pub executed_at: Timestamp,
    pub retry_count: Option<i32>,
    pub git_commit: Option<String>,
    pub environment: Option<String>,
    pub build_id: Option<String>,
    pub error_signature: Option<String>,
    pub error_message: Option<String>,
    pub tags: Vec<String>,
    pub run_id: String,
}

/// One append-only row per `step_end` event (BDD/keyword-driven producers).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepExecution {
    pub step_id: String,
    pub scenario_id: String,
    pub test_id: String,
    pub step_text: String,
    pub step_index: i32,
    pub status: TestStatus,
    pub duration_ms: Option<i64>,
    pub executed_at: Timestamp,
    pub error_signature: Option<String>,
    pub error_message: Option<String>,
    pub framework: String,
    pub retry_count: Option<i32>,
}

/// One append-only row per `request_end` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpCall {
    pub test_id: String,
    pub method: String,
    /// Normalized: numeric id and UUID path segments replaced with
    /// `{id}` / `{uuid}` so the row doesn't explode endpoint cardinality.
    pub endpoint_path: String,
    pub status_code: u16,
    pub duration_ms: i64,
    pub success: bool,
    pub timestamp: Timestamp,
}

impl HttpCall {
    /// `success` is defined as a 2xx status code (§3).
    pub fn is_success(status_code: u16) -> bool {
        (200..300).contains(&status_code)
    }
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
