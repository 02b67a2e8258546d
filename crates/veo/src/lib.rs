//! Google Veo video generation client.
//!
//! - [`VeoApi`]: thin REST wrapper over the Gemini API long-running
//!   `predictLongRunning` endpoint, operation polling and file download.
//! - [`VeoClient`]: [`VideoProvider`](veostudio_core::provider::VideoProvider)
//!   implementation that submits, polls to completion and classifies errors.
//! - [`VeoConfig`]: environment-driven configuration.

pub mod api;
pub mod client;
pub mod config;

pub use api::{VeoApi, VeoApiError};
pub use client::VeoClient;
pub use config::VeoConfig;
