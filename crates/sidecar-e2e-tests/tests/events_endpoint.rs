//! End-to-end test of the Producer API (§4.1): a submitted event is
//! accepted over the wire, drained by a real worker task, and lands in
//! persistence.

mod common;

use common::{http_client, TestServer};
use sidecar_core::config::SidecarConfig;
use std::time::Duration;

#[tokio::test]
async fn submitted_test_end_event_is_accepted_and_persisted() {
    let mut config = SidecarConfig::default();
    config.sampling.rates.events = 1.0;
    config.persistence.batch_size = 1;
    config.persistence.batch_linger_ms = 20;

    let server = TestServer::start_with_config(config).await;
    let client = http_client();

    let payload = serde_json::json!({
        "event_type": "test_end",
        "framework": "pytest",
        "run_id": "R1",
        "test_id": "pytest::a.py::t1",
        "data": {"test_name": "t1", "status": "PASS", "elapsed_time": 0.5}
    });

    let response = client
        .post(server.url("/events"))
        .json(&payload)
        .send()
        .await
        .expect("request failed");

    assert_eq!(response.status(), 202);
    let body: serde_json::Value = response.json().await.expect("response should be valid JSON");
    assert_eq!(body["queued"], true);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(server.persistence.len().await, 1, "the event should have been dequeued, dispatched, and persisted");

    server.shutdown().await;
}

#[tokio::test]
async fn malformed_event_is_rejected_with_400() {
    let server = TestServer::start().await;
    let client = http_client();

    let payload = serde_json::json!({
        "event_type": "not_a_real_event_type",
        "framework": "pytest",
    });

    let response = client
        .post(server.url("/events"))
        .json(&payload)
        .send()
        .await
        .expect("request failed");

    assert_eq!(response.status(), 400);

    server.shutdown().await;
}
