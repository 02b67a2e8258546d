//! Boundary to durable artifact storage.

use async_trait::async_trait;

use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("invalid storage key: {0}")]
    InvalidKey(String),
}

/// Writes rendered videos somewhere clients can fetch them.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    fn name(&self) -> &str;

    /// Store `bytes` under `key` and return a publicly reachable locator.
    ///
    /// Uploading the same key twice overwrites; callers key by generation id
    /// so a retried upload is harmless.
    async fn upload(&self, key: &str, bytes: Vec<u8>, content_type: &str)
        -> Result<String, StorageError>;
}

/// Storage key for a generation's video.
pub fn video_key(generation_id: DbId) -> String {
    format!("generations/{generation_id}.mp4")
}

/// Reject keys that could escape the storage root.
pub fn check_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty()
        || key.starts_with('/')
        || key.split('/').any(|part| part == ".." || part.is_empty())
    {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}
