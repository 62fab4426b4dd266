//! The universal event envelope accepted by the Producer API.

use crate::{RunId, TestId, Timestamp, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Closed set of event types the core understands. Unknown types are
/// rejected at the Producer API boundary (§3 invariant: "event_type is
/// closed").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    SessionStart,
    SessionFinish,
    TestStart,
    TestEnd,
    StepStart,
    StepEnd,
    RequestStart,
    RequestEnd,
    Log,
    Custom,
}

impl EventType {
    /// Whether this event type carries a `test_id` that must be present.
    pub fn requires_test_id(&self) -> bool {
        matches!(
            self,
            Self::TestStart
                | Self::TestEnd
                | Self::StepStart
                | Self::StepEnd
                | Self::RequestStart
                | Self::RequestEnd
        )
    }

    /// Whether this event type must carry a `run_id` (every type except a
    /// bare `session_start`, which establishes the run).
    pub fn requires_run_id(&self) -> bool {
        !matches!(self, Self::Log | Self::Custom)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::SessionStart => "session_start",
            Self::SessionFinish => "session_finish",
            Self::TestStart => "test_start",
            Self::TestEnd => "test_end",
            Self::StepStart => "step_start",
            Self::StepEnd => "step_end",
            Self::RequestStart => "request_start",
            Self::RequestEnd => "request_end",
            Self::Log => "log",
            Self::Custom => "custom",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for EventType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "session_start" => Self::SessionStart,
            "session_finish" => Self::SessionFinish,
            "test_start" => Self::TestStart,
            "test_end" => Self::TestEnd,
            "step_start" => Self::StepStart,
            "step_end" => Self::StepEnd,
            "request_start" => Self::RequestStart,
            "request_end" => Self::RequestEnd,
            "log" => Self::Log,
            "custom" => Self::Custom,
            other => {
                return Err(ValidationError::UnknownEventType {
                    value: other.to_string(),
                })
            }
        })
    }
}

/// The wire shape of an accepted event, prior to timestamp stamping.
///
/// `data` stays a loose JSON map on ingress (source systems emit
/// heterogeneous per-type payloads); the worker pool projects it into a
/// strongly typed persistence record at dispatch time (§4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Kept as a raw string on the wire shape rather than `EventType`
    /// directly: an unknown value must fail at `validate()` (and surface as
    /// the API's own `400`), not as a generic JSON-extraction rejection.
    pub event_type: String,
    #[serde(default)]
    pub framework: String,
    pub timestamp: Option<String>,
    pub run_id: Option<String>,
    pub test_id: Option<String>,
    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,
}

/// Reason an event envelope failed Producer API validation.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
pub enum EventValidationError {
    #[error("missing required field: {0}")]
    MissingField(#[from] ValidationError),

    #[error("malformed timestamp '{value}'")]
    MalformedTimestamp { value: String },
}

/// A validated, core-stamped event ready for sampling and enqueue.
#[derive(Debug, Clone)]
pub struct ValidatedEvent {
    pub event_type: EventType,
    pub framework: String,
    pub timestamp: Timestamp,
    pub run_id: Option<RunId>,
    pub test_id: Option<TestId>,
    pub data: HashMap<String, serde_json::Value>,
}

impl EventEnvelope {
    /// Validate the envelope and stamp a timestamp if absent.
    ///
    /// This is the single gate described in spec §3/§4.1: unknown
    /// `event_type`, missing `test_id` on a type that requires it, or a
    /// malformed `timestamp` are all rejected here, before sampling or
    /// enqueue.
    pub fn validate(self) -> Result<ValidatedEvent, EventValidationError> {
        let event_type: EventType = self.event_type.parse()?;

        let run_id = match self.run_id {
            Some(raw) => Some(RunId::new(raw)?),
            None if event_type.requires_run_id() => {
                return Err(ValidationError::Required {
                    field: "run_id".to_string(),
                }
                .into())
            }
            None => None,
        };

        let test_id = match self.test_id {
            Some(raw) => Some(TestId::new(raw)?),
            None if event_type.requires_test_id() => {
                return Err(ValidationError::Required {
                    field: "test_id".to_string(),
                }
                .into())
            }
            None => None,
        };

        let timestamp = match self.timestamp {
            Some(raw) => Timestamp::from_rfc3339(&raw)
                .map_err(|_| EventValidationError::MalformedTimestamp { value: raw })?,
            None => Timestamp::now(),
        };

        Ok(ValidatedEvent {
            event_type,
            framework: self.framework,
            timestamp,
            run_id,
            test_id,
            data: self.data,
        })
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
