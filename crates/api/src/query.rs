//! Query parameter types shared by handlers.

use serde::Deserialize;
use veostudio_core::types::UserId;
use veostudio_pipeline::store::Page;

/// `?user_id=&limit=&offset=` for listing a user's generations. Limits are
/// clamped by the store.
#[derive(Debug, Deserialize)]
pub struct ListGenerationsParams {
    pub user_id: UserId,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListGenerationsParams {
    pub fn page(&self) -> Page {
        Page {
            limit: self.limit,
            offset: self.offset,
        }
    }
}

/// `?product_type=&limit=&offset=` for listing saved templates.
#[derive(Debug, Deserialize)]
pub struct ListTemplatesParams {
    pub product_type: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListTemplatesParams {
    pub fn page(&self) -> Page {
        Page {
            limit: self.limit,
            offset: self.offset,
        }
    }
}
