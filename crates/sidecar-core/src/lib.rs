//! # Sidecar Core
//!
//! Domain model and cross-cutting traits for the test-observability sidecar.
//!
//! This crate has no I/O of its own: it defines the event envelope, the
//! persisted-entity model, the configuration schema, the `MetricsCollector`
//! trait, the sampler, the fail-open wrapper, and the error-signature hasher.
//! Infrastructure crates (`sidecar-queue`, `sidecar-persistence`,
//! `sidecar-resources`, `sidecar-api`) depend on this crate, never the
//! reverse.
//!
//! ## Usage
//!
//! ```rust
//! use sidecar_core::{EventId, RunId};
//!
//! let event_id = EventId::new();
//! let run_id = RunId::new("R1").unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use ulid::Ulid;

/// Standard result type for sidecar-core operations.
pub type SidecarResult<T> = Result<T, SidecarError>;

// ============================================================================
// Domain identifier types
// ============================================================================

/// Unique identifier assigned to every accepted event.
///
/// Uses ULID so ingestion order is recoverable from the identifier alone.
/// Always generated by the core; never supplied by producers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(Ulid);

impl EventId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EventId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ulid = s.parse::<Ulid>().map_err(|_| ParseError::InvalidFormat {
            expected: "ULID format".to_string(),
            actual: s.to_string(),
        })?;
        Ok(Self(ulid))
    }
}

/// Opaque correlation identifier for the session (test run) containing an event.
///
/// Producer-supplied; validated but otherwise untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(String);

impl RunId {
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        validate_opaque_id("run_id", &value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RunId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Stable test identifier, conventionally `{framework}::{file}::{name}`.
///
/// Producer-supplied; validated but otherwise untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TestId(String);

impl TestId {
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        validate_opaque_id("test_id", &value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TestId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Shared validation for `RunId`/`TestId`: non-empty, ASCII-graphic (no
/// whitespace), at most 256 bytes. Producers are expected to hand the core
/// opaque correlation strings, not free text.
fn validate_opaque_id(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    if value.len() > 256 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max_length: 256,
        });
    }
    if !value.chars().all(|c| c.is_ascii_graphic()) {
        return Err(ValidationError::InvalidCharacters {
            field: field.to_string(),
            invalid_chars: "non-ASCII or whitespace".to_string(),
        });
    }
    Ok(())
}

// ============================================================================
// Time
// ============================================================================

/// UTC timestamp, RFC3339 on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(chrono::DateTime<chrono::Utc>);

impl Timestamp {
    pub fn now() -> Self {
        Self(chrono::Utc::now())
    }

    pub fn from_rfc3339(s: &str) -> Result<Self, ParseError> {
        let dt = chrono::DateTime::parse_from_rfc3339(s)
            .map_err(|_| ParseError::InvalidFormat {
                expected: "RFC3339 datetime".to_string(),
                actual: s.to_string(),
            })?
            .with_timezone(&chrono::Utc);
        Ok(Self(dt))
    }

    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }

    pub fn as_datetime(&self) -> &chrono::DateTime<chrono::Utc> {
        &self.0
    }
}

impl From<chrono::DateTime<chrono::Utc>> for Timestamp {
    fn from(dt: chrono::DateTime<chrono::Utc>) -> Self {
        Self(dt)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_rfc3339())
    }
}

// ============================================================================
// Error taxonomy
// ============================================================================

/// Error type for input validation failures.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Field '{field}' has invalid format: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Field '{field}' exceeds maximum length of {max_length}")]
    TooLong { field: String, max_length: usize },

    #[error("Field '{field}' contains invalid characters: {invalid_chars}")]
    InvalidCharacters {
        field: String,
        invalid_chars: String,
    },

    #[error("Unknown event_type '{value}'")]
    UnknownEventType { value: String },
}

/// Error type for string parsing failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid format: expected {expected}, got '{actual}'")]
    InvalidFormat { expected: String, actual: String },
}

/// Category used for dashboards and alerting; mirrors the spec's error
/// taxonomy (§7) so every layer can bucket errors the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Dropped at the boundary; caller already has a typed result.
    Rejected,
    /// Retryable without operator intervention.
    Transient,
    /// Will not succeed on retry; batch or event is discarded.
    Permanent,
    /// Operator-facing configuration mistake.
    Configuration,
}

/// Top-level error type for sidecar-core operations.
#[derive(Debug, thiserror::Error)]
pub enum SidecarError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl SidecarError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    pub fn error_category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::Rejected,
            Self::Parse(_) => ErrorCategory::Rejected,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Transient,
        }
    }
}

// ============================================================================
// Module declarations
// ============================================================================

/// The event envelope and per-type payloads.
pub mod event;

/// Persisted-entity model (Session, TestExecution, StepExecution, HttpCall).
pub mod model;

/// Configuration schema, validation and reload diffing.
pub mod config;

/// The `MetricsCollector` trait, implemented by the infrastructure layer.
pub mod monitoring;

/// The fail-open wrapper applied to every observation-path function.
pub mod fail_open;

/// Per-category probabilistic sampling.
pub mod sampler;

/// Stable error-message fingerprinting for downstream deduplication.
pub mod error_signature;

pub use config::{ConfigError, SidecarConfig};
pub use event::{EventEnvelope, EventType, EventValidationError};
pub use fail_open::{fail_open, Observed};
pub use model::{HttpCall, Session, StepExecution, TestExecution, TestStatus};
pub use monitoring::MetricsCollector;
pub use sampler::{SampleCategory, Sampler};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
