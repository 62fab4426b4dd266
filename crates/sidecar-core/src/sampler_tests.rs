use super::*;
use crate::config::SamplingRates;

#[test]
fn rate_one_always_keeps() {
    let sampler = Sampler::new(SamplingRates {
        events: 1.0,
        ..Default::default()
    });
    for _ in 0..50 {
        assert!(sampler.should_sample(SampleCategory::Events));
    }
}

#[test]
fn rate_zero_always_drops() {
    let sampler = Sampler::new(SamplingRates {
        events: 0.0,
        ..Default::default()
    });
    for _ in 0..50 {
        assert!(!sampler.should_sample(SampleCategory::Events));
    }
}

#[test]
fn metrics_category_defaults_to_always_keep() {
    let sampler = Sampler::new(SamplingRates::default());
    for _ in 0..50 {
        assert!(sampler.should_sample(SampleCategory::Metrics));
    }
}

#[test]
fn intermediate_rate_produces_both_outcomes_over_many_trials() {
    let sampler = Sampler::new(SamplingRates {
        events: 0.5,
        ..Default::default()
    });
    let mut kept = 0;
    let mut dropped = 0;
    for _ in 0..500 {
        if sampler.should_sample(SampleCategory::Events) {
            kept += 1;
        } else {
            dropped += 1;
        }
    }
    assert!(kept > 0, "expected at least one keep over 500 trials");
    assert!(dropped > 0, "expected at least one drop over 500 trials");
}
