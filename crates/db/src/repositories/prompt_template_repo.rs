//! Repository for the `prompt_templates` table.

use sqlx::PgPool;
use veostudio_core::templates::NewSavedTemplate;
use veostudio_core::types::DbId;

use crate::models::prompt_template::PromptTemplate;

const COLUMNS: &str = "\
    id, slug, name, prompt, product_type, tags, notes, usage_count, created_at";

pub struct PromptTemplateRepo;

impl PromptTemplateRepo {
    /// Insert a template. A taken slug surfaces as a unique violation.
    pub async fn create(
        pool: &PgPool,
        new: &NewSavedTemplate,
    ) -> Result<PromptTemplate, sqlx::Error> {
        let query = format!(
            "INSERT INTO prompt_templates (slug, name, prompt, product_type, tags, notes) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PromptTemplate>(&query)
            .bind(new.slug())
            .bind(&new.name)
            .bind(&new.prompt)
            .bind(&new.product_type)
            .bind(&new.tags)
            .bind(&new.notes)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<PromptTemplate>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM prompt_templates WHERE id = $1");
        sqlx::query_as::<_, PromptTemplate>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Count one use and return the updated row.
    pub async fn record_use(pool: &PgPool, id: DbId) -> Result<Option<PromptTemplate>, sqlx::Error> {
        let query = format!(
            "UPDATE prompt_templates SET usage_count = usage_count + 1 \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PromptTemplate>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Newest first, optionally for one product type.
    pub async fn list(
        pool: &PgPool,
        product_type: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PromptTemplate>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM prompt_templates \
             WHERE ($1::TEXT IS NULL OR product_type = $1) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, PromptTemplate>(&query)
            .bind(product_type)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }
}
