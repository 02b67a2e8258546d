//! Repository for the `generation_events` audit table.

use sqlx::PgPool;
use veostudio_core::types::DbId;

use crate::models::event::GenerationEventRow;

/// Column list for `generation_events` queries.
const COLUMNS: &str = "id, event_type, generation_id, user_id, payload, created_at";

pub struct EventRepo;

impl EventRepo {
    /// Insert a new event row, returning the generated ID.
    pub async fn insert(
        pool: &PgPool,
        event_type: &str,
        generation_id: Option<DbId>,
        user_id: Option<DbId>,
        payload: &serde_json::Value,
    ) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO generation_events (event_type, generation_id, user_id, payload) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id",
        )
        .bind(event_type)
        .bind(generation_id)
        .bind(user_id)
        .bind(payload)
        .fetch_one(pool)
        .await
    }

    /// Events for one generation, oldest first.
    pub async fn list_for_generation(
        pool: &PgPool,
        generation_id: DbId,
    ) -> Result<Vec<GenerationEventRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM generation_events \
             WHERE generation_id = $1 \
             ORDER BY created_at ASC, id ASC"
        );
        sqlx::query_as::<_, GenerationEventRow>(&query)
            .bind(generation_id)
            .fetch_all(pool)
            .await
    }
}
