//! Repository for the `context_snapshots` cache table.

use sqlx::PgPool;
use veostudio_core::types::{DbId, Timestamp};

use crate::models::context_snapshot::{ContextSnapshot, NO_PROJECT};

/// Column list for `context_snapshots` queries.
const COLUMNS: &str = "user_id, task_type, project_id, content, refreshed_at";

pub struct ContextSnapshotRepo;

impl ContextSnapshotRepo {
    pub async fn find(
        pool: &PgPool,
        user_id: DbId,
        task_type: &str,
        project_id: Option<DbId>,
    ) -> Result<Option<ContextSnapshot>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM context_snapshots \
             WHERE user_id = $1 AND task_type = $2 AND project_id = $3"
        );
        sqlx::query_as::<_, ContextSnapshot>(&query)
            .bind(user_id)
            .bind(task_type)
            .bind(project_id.unwrap_or(NO_PROJECT))
            .fetch_optional(pool)
            .await
    }

    /// Insert or overwrite the snapshot for a key.
    pub async fn upsert(
        pool: &PgPool,
        user_id: DbId,
        task_type: &str,
        project_id: Option<DbId>,
        content: &str,
        refreshed_at: Timestamp,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO context_snapshots (user_id, task_type, project_id, content, refreshed_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (user_id, task_type, project_id) DO UPDATE \
                SET content = EXCLUDED.content, refreshed_at = EXCLUDED.refreshed_at",
        )
        .bind(user_id)
        .bind(task_type)
        .bind(project_id.unwrap_or(NO_PROJECT))
        .bind(content)
        .bind(refreshed_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Drop snapshots older than `max_age_secs`. Returns the number removed.
    pub async fn purge_older_than(pool: &PgPool, max_age_secs: f64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM context_snapshots WHERE refreshed_at < NOW() - make_interval(secs => $1)",
        )
        .bind(max_age_secs)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
