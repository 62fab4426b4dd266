//! Batching and retry policy for the Worker Pool's persistence step (§4.4).

use rand::Rng;
use std::time::Duration;

/// How many records a worker accumulates, and for how long, before
/// committing a batch. Whichever threshold is reached first wins.
#[derive(Debug, Clone, Copy)]
pub struct BatchPolicy {
    pub batch_size: usize,
    pub batch_linger: Duration,
}

impl BatchPolicy {
    pub fn new(batch_size: usize, batch_linger_ms: u64) -> Self {
        Self {
            batch_size,
            batch_linger: Duration::from_millis(batch_linger_ms),
        }
    }
}

/// Exponential backoff with jitter for a single batch retry.
///
/// Per spec §4.4: base 100 ms, factor 2, max 1 s, and a batch is retried
/// exactly once before being discarded.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter_percent: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            jitter_percent: 0.25,
        }
    }
}

impl RetryPolicy {
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay_secs =
            self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        let capped_delay_secs = base_delay_secs.min(self.max_delay.as_secs_f64());
        let final_delay_secs = Self::add_jitter(capped_delay_secs, self.jitter_percent);
        Duration::from_secs_f64(final_delay_secs.max(0.0))
    }

    fn add_jitter(delay_secs: f64, jitter_percent: f64) -> f64 {
        let jitter_range = delay_secs * jitter_percent;
        let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
        delay_secs + jitter
    }
}

#[cfg(test)]
#[path = "batch_tests.rs"]
mod tests;
