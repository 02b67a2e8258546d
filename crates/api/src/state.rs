use std::sync::Arc;

use veostudio_pipeline::{AdmissionService, TemplateLibrary};

use crate::config::ServerConfig;

/// Shared application state available to all handlers via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    /// Admission, status and budget operations over the configured stores.
    pub admission: Arc<AdmissionService>,
    pub templates: Arc<TemplateLibrary>,
    pub config: Arc<ServerConfig>,
}
