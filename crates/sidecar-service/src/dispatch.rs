//! Dispatch table projecting a `ValidatedEvent` into one `PersistenceRecord`
//! (§4.4a). This is pure data transformation: no I/O, so the Worker Pool can
//! unit-test the projection without a `Persistence` backend.

use sidecar_core::error_signature;
use sidecar_core::event::{EventType, ValidatedEvent};
use sidecar_core::model::{HttpCall, StepExecution, TestExecution, TestStatus};
use sidecar_persistence::PersistenceRecord;

/// Outcome of dispatching one event: either a record to persist, or a
/// decision to drop it pre-persistence without that counting as a failure
/// (§4.4a: `log`/`custom` events not configured to keep their raw payload,
/// and `test_start`/`step_start`/`request_start` events, which only exist
/// to bound an in-flight duration and carry nothing worth storing on their
/// own).
pub enum Dispatch {
    Record(PersistenceRecord),
    Consumed,
}

/// Build the persistence record (or no-op) for one validated event.
///
/// `keep_raw` mirrors `persistence.keep_raw` (§6): when set, `log`/`custom`
/// events are kept as a raw-payload `TestExecution`-shaped row is *not*
/// attempted — there is no fixed table for arbitrary payloads, so
/// `keep_raw` currently only affects whether such events are logged at
/// `debug` before being discarded. They are always `Dispatch::Consumed`.
pub fn dispatch(event: ValidatedEvent, keep_raw: bool) -> Dispatch {
    match event.event_type {
        EventType::SessionStart => Dispatch::Record(PersistenceRecord::SessionStart {
            run_id: run_id_string(&event),
            framework: event.framework,
            product_name: string_field(&event, "product_name"),
            application_version: string_field(&event, "application_version"),
            environment: string_field(&event, "environment"),
            started_at: event.timestamp,
        }),

        EventType::SessionFinish => Dispatch::Record(PersistenceRecord::SessionFinish {
            run_id: run_id_string(&event),
            finished_at: event.timestamp,
            total_tests: int_field(&event, "num_total_tests"),
            passed: int_field(&event, "num_passed_tests"),
            failed: int_field(&event, "num_failed_tests"),
        }),

        EventType::TestStart | EventType::StepStart | EventType::RequestStart => {
            Dispatch::Consumed
        }

        EventType::TestEnd => {
            let status = string_field(&event, "status")
                .and_then(|s| TestStatus::from_wire(&s))
                .unwrap_or(TestStatus::Error);
            let error_message = string_field(&event, "message");
            Dispatch::Record(PersistenceRecord::TestExecution(TestExecution {
                test_id: test_id_string(&event),
                test_name: string_field(&event, "test_name").unwrap_or_default(),
                framework: event.framework,
                status,
                duration_ms: duration_ms(&event),
                executed_at: event.timestamp,
                retry_count: int_field(&event, "retry_count").map(|v| v as i32),
                git_commit: string_field(&event, "git_commit"),
                environment: string_field(&event, "environment"),
                build_id: string_field(&event, "build_id"),
                error_signature: error_message.as_deref().map(error_signature::compute),
                error_message,
                tags: string_list_field(&event, "tags"),
                run_id: run_id_string(&event),
            }))
        }

        EventType::StepEnd => {
            let status = string_field(&event, "status")
                .and_then(|s| TestStatus::from_wire(&s))
                .unwrap_or(TestStatus::Error);
            let error_message = string_field(&event, "message");
            Dispatch::Record(PersistenceRecord::StepExecution(StepExecution {
                step_id: string_field(&event, "step_id").unwrap_or_default(),
                scenario_id: string_field(&event, "scenario_id").unwrap_or_default(),
                test_id: test_id_string(&event),
                step_text: string_field(&event, "step_text").unwrap_or_default(),
                step_index: int_field(&event, "step_index").unwrap_or(0) as i32,
                status,
                duration_ms: duration_ms(&event),
                executed_at: event.timestamp,
                error_signature: error_message.as_deref().map(error_signature::compute),
                error_message,
                framework: event.framework,
                retry_count: int_field(&event, "retry_count").map(|v| v as i32),
            }))
        }

        EventType::RequestEnd => {
            let status_code = int_field(&event, "status_code").unwrap_or(0) as u16;
            Dispatch::Record(PersistenceRecord::HttpCall(HttpCall {
                test_id: test_id_string(&event),
                method: string_field(&event, "method").unwrap_or_default(),
                endpoint_path: normalize_endpoint_path(&string_field(&event, "uri").unwrap_or_default()),
                status_code,
                duration_ms: duration_ms(&event).unwrap_or(0),
                success: HttpCall::is_success(status_code),
                timestamp: event.timestamp,
            }))
        }

        EventType::Log | EventType::Custom => {
            if keep_raw {
                tracing::debug!(event_type = %event.event_type, "discarding log/custom event payload (no fixed table to store it in)");
            }
            Dispatch::Consumed
        }
    }
}

fn run_id_string(event: &ValidatedEvent) -> String {
    event.run_id.as_ref().map(|id| id.as_str().to_string()).unwrap_or_default()
}

fn test_id_string(event: &ValidatedEvent) -> String {
    event.test_id.as_ref().map(|id| id.as_str().to_string()).unwrap_or_default()
}

fn string_field(event: &ValidatedEvent, key: &str) -> Option<String> {
    event.data.get(key).and_then(|v| v.as_str().map(str::to_string))
}

fn int_field(event: &ValidatedEvent, key: &str) -> Option<i64> {
    event.data.get(key).and_then(|v| v.as_i64())
}

fn string_list_field(event: &ValidatedEvent, key: &str) -> Vec<String> {
    event
        .data
        .get(key)
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

/// Normalize `elapsed_time`/`duration_ms` into integer milliseconds (§6
/// note): a `_ms`-suffixed field is already in milliseconds; `elapsed_time`
/// is assumed to be a seconds-float per producer convention.
fn duration_ms(event: &ValidatedEvent) -> Option<i64> {
    if let Some(ms) = event.data.get("duration_ms").and_then(|v| v.as_i64()) {
        return Some(ms);
    }
    event
        .data
        .get("elapsed_time")
        .and_then(|v| v.as_f64())
        .map(|seconds| (seconds * 1000.0).round() as i64)
}

/// Replace numeric-id and UUID path segments with `{id}` / `{uuid}` so
/// `http_call.endpoint_path` doesn't explode cardinality per distinct
/// resource (§3, §4.4a).
fn normalize_endpoint_path(uri: &str) -> String {
    let path = uri.split('?').next().unwrap_or(uri);
    path.split('/')
        .map(|segment| {
            if segment.is_empty() {
                segment.to_string()
            } else if is_uuid_like(segment) {
                "{uuid}".to_string()
            } else if segment.chars().all(|c| c.is_ascii_digit()) {
                "{id}".to_string()
            } else {
                segment.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn is_uuid_like(segment: &str) -> bool {
    let parts: Vec<&str> = segment.split('-').collect();
    parts.len() == 5
        && [8, 4, 4, 4, 12]
            .iter()
            .zip(parts.iter())
            .all(|(len, part)| part.len() == *len && part.chars().all(|c| c.is_ascii_hexdigit()))
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
