//! The fail-open wrapper: the single higher-order construct every
//! observation-path function (enqueue, sample, persist, metric-update,
//! resource-sample) is run through (§4.8).
//!
//! Rust has no catch-all exception type to mirror the source decorator
//! (`@safe_observe`) directly. The two things that can go wrong inside an
//! observation-path closure are a typed `Result::Err` and a panic; this
//! wrapper catches both, logs one structured `sidecar_error` line, and
//! increments `errors_total{operation}` exactly once, regardless of which
//! of the two occurred. It never retries and never re-raises — the caller
//! always gets an `Observed<T>` sentinel, never a propagated error.

use crate::monitoring::MetricsCollector;
use std::panic::{self, AssertUnwindSafe};

/// The result of running a closure through the fail-open wrapper: either
/// the closure's value, or nothing, if it failed or panicked. Callers
/// inspect this the same way regardless of which happened — the wrapper's
/// entire point is that the distinction is invisible past this boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observed<T>(Option<T>);

impl<T> Observed<T> {
    pub fn some(value: T) -> Self {
        Self(Some(value))
    }

    pub fn none() -> Self {
        Self(None)
    }

    pub fn into_option(self) -> Option<T> {
        self.0
    }

    pub fn is_some(&self) -> bool {
        self.0.is_some()
    }
}

/// Run `f`, swallowing any `Err` or panic it produces.
///
/// `operation` is the tag used for both the structured log line and
/// `errors_total{operation}`.
pub fn fail_open<T, E, F>(operation: &str, metrics: &dyn MetricsCollector, f: F) -> Observed<T>
where
    F: FnOnce() -> Result<T, E>,
    E: std::fmt::Display,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Observed::some(value),
        Ok(Err(error)) => {
            tracing::error!(
                operation,
                error_type = std::any::type_name::<E>(),
                error_message = %error,
                "sidecar_error"
            );
            metrics.record_error(operation);
            Observed::none()
        }
        Err(panic) => {
            let message = panic_message(&panic);
            tracing::error!(
                operation,
                error_type = "panic",
                error_message = %message,
                "sidecar_error"
            );
            metrics.record_error(operation);
            Observed::none()
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
#[path = "fail_open_tests.rs"]
mod tests;
