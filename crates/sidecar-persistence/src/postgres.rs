//! Postgres-backed `Persistence` (§4.5, §6).
//!
//! Each call to `write_batch` runs inside a single transaction: either the
//! whole batch lands or none of it does. Row-level duplicates (same
//! `test_id`/`run_id`/`executed_at`) are absorbed with `ON CONFLICT DO
//! NOTHING` rather than surfaced as errors, since the spec treats
//! duplicate submission as an idempotence case, not a failure (§8).
//!
//! Queries are built with `sqlx::query`/`query_scalar` rather than the
//! `query!` macro family, since the macros need a live database reachable
//! at compile time and this crate is built without one.

use crate::{BatchOutcome, PersistenceError, PersistenceRecord};
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, Transaction};
use std::time::Duration;

use crate::Persistence;

pub struct PgPersistence {
    pool: PgPool,
}

impl PgPersistence {
    /// Connects with a bounded pool. `max_connections` should track the
    /// worker pool size (§5) plus headroom for the health check.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, PersistenceError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(|e| PersistenceError::Fatal {
                message: format!("failed to connect to postgres: {e}"),
            })?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_one(
        tx: &mut Transaction<'_, Postgres>,
        record: &PersistenceRecord,
    ) -> Result<bool, sqlx::Error> {
        let rows_affected = match record {
            PersistenceRecord::SessionStart {
                run_id,
                framework,
                product_name,
                application_version,
                environment,
                started_at,
            } => {
                sqlx::query(
                    "INSERT INTO session (run_id, framework, product_name, application_version, environment, started_at)
                     VALUES ($1, $2, $3, $4, $5, $6)
                     ON CONFLICT (run_id) DO NOTHING",
                )
                .bind(run_id)
                .bind(framework)
                .bind(product_name)
                .bind(application_version)
                .bind(environment)
                .bind(started_at.as_datetime())
                .execute(&mut **tx)
                .await?
                .rows_affected()
            }
            PersistenceRecord::SessionFinish {
                run_id,
                finished_at,
                total_tests,
                passed,
                failed,
            } => {
                // §4.5: "if the row is missing, create a synthetic one with
                // started_at = finished_at." A plain UPDATE would silently
                // no-op (and get misclassified as a duplicate below) for the
                // orphaned/out-of-order session_finish §5 explicitly
                // permits, so this upserts instead: on conflict, only the
                // finish-time fields are touched, leaving the real
                // started_at from the matching session_start alone.
                sqlx::query(
                    "INSERT INTO session (run_id, started_at, finished_at, total_tests, passed, failed)
                     VALUES ($1, $2, $2, $3, $4, $5)
                     ON CONFLICT (run_id) DO UPDATE
                     SET finished_at = EXCLUDED.finished_at,
                         total_tests = EXCLUDED.total_tests,
                         passed = EXCLUDED.passed,
                         failed = EXCLUDED.failed",
                )
                .bind(run_id)
                .bind(finished_at.as_datetime())
                .bind(total_tests)
                .bind(passed)
                .bind(failed)
                .execute(&mut **tx)
                .await?
                .rows_affected()
            }
            PersistenceRecord::TestExecution(test) => {
                sqlx::query(
                    "INSERT INTO test_execution
                         (test_id, run_id, test_name, framework, status, duration_ms, executed_at,
                          retry_count, git_commit, environment, build_id, error_signature, error_message, tags)
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                     ON CONFLICT (test_id, run_id, executed_at) DO NOTHING",
                )
                .bind(&test.test_id)
                .bind(&test.run_id)
                .bind(&test.test_name)
                .bind(&test.framework)
                .bind(test.status.to_string())
                .bind(test.duration_ms)
                .bind(test.executed_at.as_datetime())
                .bind(test.retry_count)
                .bind(&test.git_commit)
                .bind(&test.environment)
                .bind(&test.build_id)
                .bind(&test.error_signature)
                .bind(&test.error_message)
                .bind(&test.tags)
                .execute(&mut **tx)
                .await?
                .rows_affected()
            }
            PersistenceRecord::StepExecution(step) => {
                sqlx::query(
                    "INSERT INTO step_execution
                         (step_id, scenario_id, test_id, step_text, step_index, status, duration_ms,
                          executed_at, error_signature, error_message, framework, retry_count)
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                     ON CONFLICT (step_id) DO NOTHING",
                )
                .bind(&step.step_id)
                .bind(&step.scenario_id)
                .bind(&step.test_id)
                .bind(&step.step_text)
                .bind(step.step_index)
                .bind(step.status.to_string())
                .bind(step.duration_ms)
                .bind(step.executed_at.as_datetime())
                .bind(&step.error_signature)
                .bind(&step.error_message)
                .bind(&step.framework)
                .bind(step.retry_count)
                .execute(&mut **tx)
                .await?
                .rows_affected()
            }
            PersistenceRecord::HttpCall(call) => {
                sqlx::query(
                    "INSERT INTO http_call (test_id, method, endpoint_path, status_code, duration_ms, success, timestamp)
                     VALUES ($1, $2, $3, $4, $5, $6, $7)",
                )
                .bind(&call.test_id)
                .bind(&call.method)
                .bind(&call.endpoint_path)
                .bind(call.status_code as i32)
                .bind(call.duration_ms)
                .bind(call.success)
                .bind(call.timestamp.as_datetime())
                .execute(&mut **tx)
                .await?
                .rows_affected()
            }
        };
        Ok(rows_affected > 0)
    }
}

#[async_trait]
impl Persistence for PgPersistence {
    async fn write_batch(&self, records: &[PersistenceRecord]) -> Result<BatchOutcome, PersistenceError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;
        let mut outcome = BatchOutcome::default();

        for record in records {
            match Self::insert_one(&mut tx, record).await {
                Ok(true) => outcome.written += 1,
                Ok(false) => outcome.duplicates += 1,
                Err(e) => return Err(classify(e)),
            }
        }

        tx.commit().await.map_err(classify)?;
        Ok(outcome)
    }

    async fn health_check(&self) -> Result<(), PersistenceError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        Ok(())
    }
}

/// Connection-level and constraint failures are transient (worth the one
/// retry §4.4 allows); everything else — bad SQL, type mismatches, a
/// broken transaction — is a bug in this crate and therefore fatal.
fn classify(error: sqlx::Error) -> PersistenceError {
    match &error {
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => PersistenceError::Transient {
            message: error.to_string(),
        },
        _ => PersistenceError::Fatal {
            message: error.to_string(),
        },
    }
}

#[cfg(test)]
#[path = "postgres_tests.rs"]
mod tests;
