//! Artifact storage backends.
//!
//! Both backends implement [`ArtifactStore`]: [`LocalArtifactStore`] writes
//! under a directory served by a static file host, [`S3ArtifactStore`]
//! writes to a bucket behind a public base URL.

pub mod config;
pub mod local;
pub mod s3;

use std::sync::Arc;

use veostudio_core::storage::ArtifactStore;

pub use config::{StorageBackend, StorageConfig, StorageConfigError};
pub use local::LocalArtifactStore;
pub use s3::S3ArtifactStore;

/// Construct the backend selected by `config`.
pub async fn build_store(config: &StorageConfig) -> Arc<dyn ArtifactStore> {
    match &config.backend {
        StorageBackend::Local { root, public_base_url } => {
            Arc::new(LocalArtifactStore::new(root.clone(), public_base_url.clone()))
        }
        StorageBackend::S3 {
            bucket,
            public_base_url,
        } => {
            let sdk_config = aws_config::load_from_env().await;
            let client = aws_sdk_s3::Client::new(&sdk_config);
            Arc::new(S3ArtifactStore::new(
                client,
                bucket.clone(),
                public_base_url.clone(),
            ))
        }
    }
}

/// Join a base URL and a storage key with exactly one slash.
pub(crate) fn public_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key.trim_start_matches('/'))
}
