use super::*;

#[test]
fn pool_timeout_is_classified_as_transient() {
    let err = classify(sqlx::Error::PoolTimedOut);
    assert!(err.is_transient());
}

#[test]
fn protocol_error_is_classified_as_fatal() {
    let err = classify(sqlx::Error::Protocol("boom".to_string()));
    assert!(!err.is_transient());
}

// These require a running PostgreSQL instance reachable at DATABASE_URL.
// Run with `cargo test -- --ignored`.
#[cfg(test)]
mod live {
    use super::*;
    use sidecar_core::model::{TestExecution, TestStatus};
    use sidecar_core::Timestamp;

    async fn connect() -> PgPersistence {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for live tests");
        PgPersistence::connect(&url, 5).await.expect("failed to connect")
    }

    #[tokio::test]
    #[ignore]
    async fn write_batch_is_idempotent_on_conflict() {
        let persistence = connect().await;
        let test = TestExecution {
            test_id: "test-pg-idempotence".to_string(),
            test_name: "example test".to_string(),
            framework: "pytest".to_string(),
            status: TestStatus::Passed,
            duration_ms: Some(120),
            executed_at: Timestamp::now(),
            retry_count: None,
            git_commit: None,
            environment: None,
            build_id: None,
            error_signature: None,
            error_message: None,
            tags: vec![],
            run_id: "run-pg-idempotence".to_string(),
        };
        let record = PersistenceRecord::TestExecution(test);

        let first = persistence.write_batch(&[record.clone()]).await.unwrap();
        assert_eq!(first.written, 1);

        let second = persistence.write_batch(&[record]).await.unwrap();
        assert_eq!(second.duplicates, 1);
    }

    #[tokio::test]
    #[ignore]
    async fn health_check_succeeds_against_live_database() {
        let persistence = connect().await;
        persistence.health_check().await.expect("health check failed");
    }

    #[tokio::test]
    #[ignore]
    async fn orphaned_session_finish_creates_a_synthetic_session_row() {
        let persistence = connect().await;
        let finished_at = Timestamp::now();
        let record = PersistenceRecord::SessionFinish {
            run_id: "run-pg-orphaned-finish".to_string(),
            finished_at,
            total_tests: Some(1),
            passed: Some(1),
            failed: Some(0),
        };

        // No session_start was ever recorded for this run_id (§5: a
        // session_finish may be persisted before, or without, a matching
        // session_start). Rather than being swallowed as a no-op update and
        // miscounted as a duplicate, this must synthesize a session row
        // with started_at == finished_at (§4.5).
        let outcome = persistence.write_batch(&[record]).await.unwrap();
        assert_eq!(outcome.written, 1);
        assert_eq!(outcome.duplicates, 0);
    }
}
