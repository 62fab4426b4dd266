//! Scenario 1 (spec.md §8): a single test's full lifecycle through the
//! real router and worker pool, landing in persistence with the expected
//! shape and updating `/health`'s metrics snapshot.

mod common;

use common::{get_json, post_json, session_finish, session_start, test_end, Harness};
use sidecar_core::config::SidecarConfig;
use sidecar_persistence::PersistenceRecord;
use std::time::Duration;

#[tokio::test]
async fn single_test_lifecycle_is_persisted_and_counted() {
    let mut config = SidecarConfig::default();
    config.sampling.rates.events = 1.0;
    config.persistence.batch_size = 1;
    config.persistence.batch_linger_ms = 20;

    let harness = Harness::new(config);
    let router = harness.router();

    let (status, _) = post_json(&router, "/events", session_start("R1")).await;
    assert_eq!(status, axum::http::StatusCode::ACCEPTED);

    let (status, _) = post_json(&router, "/events", test_end("R1", "pytest::a.py::t1", "PASS", 1.2)).await;
    assert_eq!(status, axum::http::StatusCode::ACCEPTED);

    let (status, _) = post_json(&router, "/events", session_finish("R1", 1, 1, 0)).await;
    assert_eq!(status, axum::http::StatusCode::ACCEPTED);

    tokio::time::sleep(Duration::from_millis(200)).await;

    let records = harness.persistence.recorded().await;
    assert_eq!(records.len(), 3, "expected session_start, test_execution and session_finish each persisted");

    let has_session_start = records.iter().any(|r| matches!(r, PersistenceRecord::SessionStart { run_id, .. } if run_id == "R1"));
    assert!(has_session_start, "expected a SessionStart record for R1");

    let has_session_finish = records.iter().any(|r| {
        matches!(r, PersistenceRecord::SessionFinish { run_id, passed: Some(1), failed: Some(0), .. } if run_id == "R1")
    });
    assert!(has_session_finish, "expected a SessionFinish record with passed=1, failed=0");

    let test_execution = records.iter().find_map(|r| match r {
        PersistenceRecord::TestExecution(t) => Some(t),
        _ => None,
    });
    let test_execution = test_execution.expect("expected a TestExecution record");
    assert_eq!(test_execution.run_id, "R1");
    assert_eq!(test_execution.duration_ms, Some(1200));

    let (_, health) = get_json(&router, "/health").await;
    assert_eq!(health["metrics"]["events_queued"], 3);
    assert_eq!(health["metrics"]["events_processed"], 3);
    assert_eq!(health["metrics"]["events_dropped"], 0);

    harness.shutdown().await;
}
