//! Row model for the `prompt_templates` table.

use serde::Serialize;
use sqlx::FromRow;
use veostudio_core::templates::SavedTemplate;
use veostudio_core::types::{DbId, Timestamp};

/// A row from the `prompt_templates` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PromptTemplate {
    pub id: DbId,
    pub slug: String,
    pub name: String,
    pub prompt: String,
    pub product_type: String,
    pub tags: Vec<String>,
    pub notes: String,
    pub usage_count: i32,
    pub created_at: Timestamp,
}

impl From<PromptTemplate> for SavedTemplate {
    fn from(row: PromptTemplate) -> Self {
        SavedTemplate {
            id: row.id,
            slug: row.slug,
            name: row.name,
            prompt: row.prompt,
            product_type: row.product_type,
            tags: row.tags,
            notes: row.notes,
            usage_count: u32::try_from(row.usage_count).unwrap_or(0),
            created_at: row.created_at,
        }
    }
}
