//! Repository for the `generations` table.
//!
//! Status transitions are guarded in SQL (`WHERE status_id IN (...)`) so a
//! stale worker can never move a record backward or out of a terminal state.
//! Each guarded method returns `true` only if it changed a row.

use sqlx::PgPool;
use veostudio_core::generation::FailureClass;
use veostudio_core::money::Money;
use veostudio_core::record::NewGeneration;
use veostudio_core::status::GenerationStatus;
use veostudio_core::types::DbId;

use crate::models::generation::Generation;

/// Column list for `generations` queries.
const COLUMNS: &str = "\
    id, user_id, project_id, request_id, prompt, negative_prompt, \
    duration_seconds, resolution, aspect_ratio, reference_images, include_audio, \
    estimated_cost, actual_cost, estimated_tokens, status_id, \
    video_url, error_message, error_class, attempt_count, \
    created_at, started_at, completed_at";

/// Maximum page size for listing.
pub const MAX_LIMIT: i64 = 100;

/// Default page size for listing.
pub const DEFAULT_LIMIT: i64 = 20;

pub struct GenerationRepo;

impl GenerationRepo {
    /// Insert a `queued` record, or return the existing one for the same
    /// `request_id`. The flag is `true` when this call created the row.
    pub async fn create_or_get(
        pool: &PgPool,
        new: &NewGeneration,
    ) -> Result<(Generation, bool), sqlx::Error> {
        let query = format!(
            "INSERT INTO generations \
                (user_id, project_id, request_id, prompt, negative_prompt, \
                 duration_seconds, resolution, aspect_ratio, reference_images, include_audio, \
                 estimated_cost, estimated_tokens, status_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             ON CONFLICT (request_id) DO NOTHING \
             RETURNING {COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, Generation>(&query)
            .bind(new.user_id)
            .bind(new.project_id)
            .bind(&new.request_id)
            .bind(&new.prompt)
            .bind(&new.negative_prompt)
            .bind(i16::from(new.params.duration.seconds()))
            .bind(new.params.resolution.as_str())
            .bind(new.params.aspect_ratio.as_str())
            .bind(&new.reference_images)
            .bind(new.include_audio)
            .bind(new.estimated_cost.cents())
            .bind(i32::try_from(new.estimated_tokens).unwrap_or(i32::MAX))
            .bind(GenerationStatus::Queued.id())
            .fetch_optional(pool)
            .await?;

        match inserted {
            Some(row) => Ok((row, true)),
            None => {
                let existing = Self::find_by_request_id(pool, &new.request_id)
                    .await?
                    .ok_or(sqlx::Error::RowNotFound)?;
                Ok((existing, false))
            }
        }
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Generation>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM generations WHERE id = $1");
        sqlx::query_as::<_, Generation>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_request_id(
        pool: &PgPool,
        request_id: &str,
    ) -> Result<Option<Generation>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM generations WHERE request_id = $1");
        sqlx::query_as::<_, Generation>(&query)
            .bind(request_id)
            .fetch_optional(pool)
            .await
    }

    /// List a user's generations, newest first.
    pub async fn list_by_user(
        pool: &PgPool,
        user_id: DbId,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Generation>, sqlx::Error> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = offset.unwrap_or(0).max(0);
        let query = format!(
            "SELECT {COLUMNS} FROM generations \
             WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, Generation>(&query)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Recent records for a user, optionally scoped to one project.
    pub async fn recent_for_context(
        pool: &PgPool,
        user_id: DbId,
        project_id: Option<DbId>,
        limit: i64,
    ) -> Result<Vec<Generation>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM generations \
             WHERE user_id = $1 AND ($2::BIGINT IS NULL OR project_id = $2) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $3"
        );
        sqlx::query_as::<_, Generation>(&query)
            .bind(user_id)
            .bind(project_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// `queued -> processing`, or re-claim of a `processing` record whose
    /// previous lease expired. `started_at` keeps the first claim time.
    pub async fn mark_processing(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generations \
             SET status_id = $2, started_at = COALESCE(started_at, NOW()) \
             WHERE id = $1 AND status_id IN ($3, $2)",
        )
        .bind(id)
        .bind(GenerationStatus::Processing.id())
        .bind(GenerationStatus::Queued.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Count one provider attempt against a `processing` record.
    pub async fn record_attempt(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generations SET attempt_count = attempt_count + 1 \
             WHERE id = $1 AND status_id = $2",
        )
        .bind(id)
        .bind(GenerationStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// `processing -> completed` with the stored video and final cost.
    pub async fn complete(
        pool: &PgPool,
        id: DbId,
        video_url: &str,
        actual_cost: Money,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generations \
             SET status_id = $2, video_url = $3, actual_cost = $4, completed_at = NOW() \
             WHERE id = $1 AND status_id = $5",
        )
        .bind(id)
        .bind(GenerationStatus::Completed.id())
        .bind(video_url)
        .bind(actual_cost.cents())
        .bind(GenerationStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// `queued | processing -> failed`.
    pub async fn fail(
        pool: &PgPool,
        id: DbId,
        class: FailureClass,
        message: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generations \
             SET status_id = $2, error_class = $3, error_message = $4, completed_at = NOW() \
             WHERE id = $1 AND status_id IN ($5, $6)",
        )
        .bind(id)
        .bind(GenerationStatus::Failed.id())
        .bind(class.as_str())
        .bind(message)
        .bind(GenerationStatus::Queued.id())
        .bind(GenerationStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
