//! Per-category probabilistic sampling (§4.2).
//!
//! Sampling happens before enqueue and is independent of queue depth: a
//! sampled-out event never touches the queue and is counted under
//! `events_sampled`, not `events_dropped`.

use crate::config::SamplingRates;
use rand::Rng;

/// The four sampling categories the config recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleCategory {
    Events,
    Logs,
    Profiling,
    Metrics,
}

/// Applies independent Bernoulli trials per category using the rates from
/// the current config snapshot.
pub struct Sampler {
    rates: SamplingRates,
}

impl Sampler {
    pub fn new(rates: SamplingRates) -> Self {
        Self { rates }
    }

    /// `true` means keep, `false` means sampled out.
    ///
    /// Rate `1.0` and `0.0` are fast paths that never touch the PRNG;
    /// every other rate runs one Bernoulli trial against the thread-local
    /// RNG.
    pub fn should_sample(&self, category: SampleCategory) -> bool {
        let rate = match category {
            SampleCategory::Events => self.rates.events,
            SampleCategory::Logs => self.rates.logs,
            SampleCategory::Profiling => self.rates.profiling,
            SampleCategory::Metrics => self.rates.metrics,
        };

        if rate >= 1.0 {
            return true;
        }
        if rate <= 0.0 {
            return false;
        }
        rand::thread_rng().gen_bool(rate)
    }

    pub fn rates(&self) -> &SamplingRates {
        &self.rates
    }
}

#[cfg(test)]
#[path = "sampler_tests.rs"]
mod tests;
