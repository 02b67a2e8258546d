//! Row model for the `context_snapshots` cache table.

use serde::Serialize;
use sqlx::FromRow;
use veostudio_core::types::{DbId, Timestamp};

/// Stored in place of a missing project id so the key stays non-null.
pub const NO_PROJECT: DbId = 0;

/// A row from the `context_snapshots` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ContextSnapshot {
    pub user_id: DbId,
    pub task_type: String,
    pub project_id: DbId,
    pub content: String,
    pub refreshed_at: Timestamp,
}
