//! Scenario 2 (spec.md §8): a small queue with draining disabled
//! (`workers=0`) fills up and starts tail-dropping; `/ready` flips to
//! `503` once utilization crosses 0.90.

mod common;

use common::{get_json, post_json, test_end, Harness};
use sidecar_core::config::SidecarConfig;

#[tokio::test]
async fn overflow_past_capacity_is_tail_dropped_and_ready_flips_503() {
    let mut config = SidecarConfig::default();
    config.sampling.rates.events = 1.0;
    config.queue.max_size = 2;
    config.workers = 0;

    let harness = Harness::new(config);
    let router = harness.router();

    let mut accepted = 0;
    let mut rejected = 0;
    for i in 0..5 {
        let (status, _) = post_json(&router, "/events", test_end("R1", &format!("pytest::a.py::t{i}"), "PASS", 1.0)).await;
        match status {
            axum::http::StatusCode::ACCEPTED => accepted += 1,
            axum::http::StatusCode::TOO_MANY_REQUESTS => rejected += 1,
            other => panic!("unexpected status {other}"),
        }
    }

    assert_eq!(accepted, 2, "only the first 2 events should fit in a queue.max_size=2 queue");
    assert_eq!(rejected, 3, "the remaining 3 events should be tail-dropped");

    let (_, health) = get_json(&router, "/health").await;
    assert_eq!(health["metrics"]["events_queued"], 2);
    assert_eq!(health["metrics"]["events_dropped"], 3);

    let (status, ready) = get_json(&router, "/ready").await;
    assert_eq!(status, axum::http::StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(ready["ready"], false);
    assert!(ready["queue_utilization"].as_f64().unwrap() >= 0.90);

    harness.shutdown().await;
}
