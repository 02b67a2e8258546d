//! Row model for the `generation_jobs` queue table.

use serde::Serialize;
use sqlx::FromRow;
use veostudio_core::status::StatusId;
use veostudio_core::types::{DbId, Timestamp};

/// A row from the `generation_jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct GenerationJob {
    pub id: DbId,
    pub generation_id: DbId,
    pub payload: serde_json::Value,
    pub state_id: StatusId,
    pub leased_by: Option<String>,
    pub lease_expires_at: Option<Timestamp>,
    pub lease_count: i32,
    pub last_error: Option<String>,
    pub last_error_class: Option<String>,
    pub enqueued_at: Timestamp,
    pub finished_at: Option<Timestamp>,
}
