//! Row model for the `generation_events` audit table.

use serde::Serialize;
use sqlx::FromRow;
use veostudio_core::types::{DbId, Timestamp};

/// A row from the `generation_events` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct GenerationEventRow {
    pub id: DbId,
    pub event_type: String,
    pub generation_id: Option<DbId>,
    pub user_id: Option<DbId>,
    pub payload: serde_json::Value,
    pub created_at: Timestamp,
}
