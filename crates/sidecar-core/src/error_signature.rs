//! Stable error-message fingerprinting (§4.5, §8).
//!
//! Two `test_end` events whose `error_message` differ only in timestamps,
//! UUIDs, numeric ids, URLs, memory addresses, and line numbers must
//! produce the same `error_signature`, so downstream consumers can cluster
//! failures. Computed here, at persistence time, so producers don't each
//! need their own normalizer.

use std::sync::LazyLock;

static TIMESTAMP: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:?\d{2})?")
        .expect("static pattern is valid")
});

static UUID: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .expect("static pattern is valid")
});

static MEMORY_ADDRESS: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"0x[0-9a-fA-F]+").expect("static pattern is valid"));

static URL: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"https?://\S+").expect("static pattern is valid"));

static LINE_NUMBER: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"(?i)\bline[ :]?\d+\b").expect("static pattern is valid"));

static NUMERIC_ID: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"\b\d{2,}\b").expect("static pattern is valid"));

/// Normalize an error message by stripping the volatile substrings listed
/// in spec §4.5/§8 (timestamps, UUIDs, numeric ids, URLs, memory
/// addresses, line numbers), then hash the result.
///
/// Order matters: URLs and UUIDs are stripped before the generic numeric
/// pattern, so e.g. a UUID's hex groups aren't partially caught by the
/// plain-number pattern first and left with dangling punctuation.
pub fn compute(error_message: &str) -> String {
    let mut normalized = error_message.to_string();
    normalized = TIMESTAMP.replace_all(&normalized, "<ts>").into_owned();
    normalized = URL.replace_all(&normalized, "<url>").into_owned();
    normalized = UUID.replace_all(&normalized, "<uuid>").into_owned();
    normalized = MEMORY_ADDRESS.replace_all(&normalized, "<addr>").into_owned();
    normalized = LINE_NUMBER.replace_all(&normalized, "<line>").into_owned();
    normalized = NUMERIC_ID.replace_all(&normalized, "<n>").into_owned();

    let digest = {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};
        let mut hasher = DefaultHasher::new();
        normalized.hash(&mut hasher);
        hasher.finish()
    };
    format!("{digest:016x}")
}

#[cfg(test)]
#[path = "error_signature_tests.rs"]
mod tests;
