//! Repository for the `generation_jobs` work queue.
//!
//! Entries move `ready -> leased -> done | dead`. A lease whose
//! `lease_expires_at` has passed is claimable again, which gives
//! at-least-once delivery when a worker dies mid-job.
//!
//! Every write by a lease holder matches on `leased_by` and on the
//! `lease_count` the lease was issued with, so a holder whose lease was
//! re-issued cannot touch the entry even under the same worker name.

use sqlx::PgPool;
use veostudio_core::status::QueueState;
use veostudio_core::types::DbId;

use crate::models::job::GenerationJob;

/// Column list for `generation_jobs` queries.
const COLUMNS: &str = "\
    id, generation_id, payload, state_id, leased_by, lease_expires_at, \
    lease_count, last_error, last_error_class, enqueued_at, finished_at";

pub struct GenerationJobRepo;

impl GenerationJobRepo {
    pub async fn enqueue(
        pool: &PgPool,
        generation_id: DbId,
        payload: &serde_json::Value,
    ) -> Result<GenerationJob, sqlx::Error> {
        let query = format!(
            "INSERT INTO generation_jobs (generation_id, payload, state_id) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, GenerationJob>(&query)
            .bind(generation_id)
            .bind(payload)
            .bind(QueueState::Ready.id())
            .fetch_one(pool)
            .await
    }

    /// Atomically lease the oldest claimable entry.
    ///
    /// Uses `SELECT FOR UPDATE SKIP LOCKED` so that concurrent workers never
    /// receive the same entry.
    pub async fn lease(
        pool: &PgPool,
        worker: &str,
        lease_secs: f64,
    ) -> Result<Option<GenerationJob>, sqlx::Error> {
        let query = format!(
            "UPDATE generation_jobs \
             SET state_id = $2, leased_by = $1, \
                 lease_expires_at = NOW() + make_interval(secs => $3), \
                 lease_count = lease_count + 1 \
             WHERE id = ( \
                 SELECT id FROM generation_jobs \
                 WHERE state_id = $4 OR (state_id = $2 AND lease_expires_at < NOW()) \
                 ORDER BY enqueued_at ASC, id ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, GenerationJob>(&query)
            .bind(worker)
            .bind(QueueState::Leased.id())
            .bind(lease_secs)
            .bind(QueueState::Ready.id())
            .fetch_optional(pool)
            .await
    }

    /// Push the lease deadline out. Fails if the lease was lost.
    pub async fn extend(
        pool: &PgPool,
        job_id: DbId,
        worker: &str,
        delivery: i32,
        lease_secs: f64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generation_jobs \
             SET lease_expires_at = NOW() + make_interval(secs => $4) \
             WHERE id = $1 AND leased_by = $2 AND lease_count = $3 AND state_id = $5",
        )
        .bind(job_id)
        .bind(worker)
        .bind(delivery)
        .bind(lease_secs)
        .bind(QueueState::Leased.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Store the latest attempt failure on a held entry.
    pub async fn record_error(
        pool: &PgPool,
        job_id: DbId,
        worker: &str,
        delivery: i32,
        class: &str,
        message: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generation_jobs \
             SET last_error_class = $4, last_error = $5 \
             WHERE id = $1 AND leased_by = $2 AND lease_count = $3 AND state_id = $6",
        )
        .bind(job_id)
        .bind(worker)
        .bind(delivery)
        .bind(class)
        .bind(message)
        .bind(QueueState::Leased.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark the entry finished.
    pub async fn ack(
        pool: &PgPool,
        job_id: DbId,
        worker: &str,
        delivery: i32,
    ) -> Result<bool, sqlx::Error> {
        Self::finish(pool, job_id, worker, delivery, QueueState::Done, None).await
    }

    /// Park the entry as undeliverable with the reason.
    pub async fn dead_letter(
        pool: &PgPool,
        job_id: DbId,
        worker: &str,
        delivery: i32,
        error: &str,
    ) -> Result<bool, sqlx::Error> {
        Self::finish(pool, job_id, worker, delivery, QueueState::Dead, Some(error)).await
    }

    async fn finish(
        pool: &PgPool,
        job_id: DbId,
        worker: &str,
        delivery: i32,
        state: QueueState,
        error: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generation_jobs \
             SET state_id = $4, last_error = COALESCE($5, last_error), finished_at = NOW() \
             WHERE id = $1 AND leased_by = $2 AND lease_count = $3 AND state_id = $6",
        )
        .bind(job_id)
        .bind(worker)
        .bind(delivery)
        .bind(state.id())
        .bind(error)
        .bind(QueueState::Leased.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Entries not yet finished (ready or leased).
    pub async fn depth(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM generation_jobs WHERE state_id IN ($1, $2)")
            .bind(QueueState::Ready.id())
            .bind(QueueState::Leased.id())
            .fetch_one(pool)
            .await
    }
}
