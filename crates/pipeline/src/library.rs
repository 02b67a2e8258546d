//! Saved prompt templates: validate, store, load.

use std::sync::Arc;

use veostudio_core::error::CoreError;
use veostudio_core::templates::{NewSavedTemplate, SavedTemplate};
use veostudio_core::types::DbId;

use crate::store::{Page, TemplateStore};

pub struct TemplateLibrary {
    store: Arc<dyn TemplateStore>,
}

impl TemplateLibrary {
    pub fn new(store: Arc<dyn TemplateStore>) -> Self {
        Self { store }
    }

    /// Normalize and save. A name whose slug is taken is a conflict.
    pub async fn save(&self, new: NewSavedTemplate) -> Result<SavedTemplate, CoreError> {
        let new = new.normalized()?;
        let template = self.store.create(&new).await?;
        tracing::info!(
            template_id = template.id,
            slug = %template.slug,
            product_type = %template.product_type,
            "Prompt template saved",
        );
        Ok(template)
    }

    /// Load a template for use, counting the use.
    pub async fn load(&self, id: DbId) -> Result<SavedTemplate, CoreError> {
        self.store
            .record_use(id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "template",
                id,
            })
    }

    pub async fn list(
        &self,
        product_type: Option<&str>,
        page: Page,
    ) -> Result<Vec<SavedTemplate>, CoreError> {
        let product_type = product_type.map(|p| p.trim().to_lowercase());
        Ok(self.store.list(product_type.as_deref(), page).await?)
    }
}
