//! Filesystem-backed artifact store.

use std::path::PathBuf;

use async_trait::async_trait;
use veostudio_core::storage::{check_key, ArtifactStore, StorageError};

use crate::public_url;

pub struct LocalArtifactStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalArtifactStore {
    pub fn new(root: PathBuf, public_base_url: String) -> Self {
        Self {
            root,
            public_base_url,
        }
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, StorageError> {
        check_key(key)?;
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write to a sibling temp file then rename so readers never see a
        // partial video.
        let tmp = path.with_extension("part");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::debug!(path = %path.display(), size = bytes.len(), "Stored artifact locally");
        Ok(public_url(&self.public_base_url, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn upload_writes_file_and_returns_public_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path().to_path_buf(), "http://media.test/".into());

        let url = store
            .upload("generations/3.mp4", vec![0, 1, 2], "video/mp4")
            .await
            .unwrap();

        assert_eq!(url, "http://media.test/generations/3.mp4");
        let written = std::fs::read(dir.path().join("generations/3.mp4")).unwrap();
        assert_eq!(written, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn reupload_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path().to_path_buf(), "http://media.test".into());
        store.upload("a.mp4", vec![1], "video/mp4").await.unwrap();
        store.upload("a.mp4", vec![2, 2], "video/mp4").await.unwrap();
        assert_eq!(std::fs::read(dir.path().join("a.mp4")).unwrap(), vec![2, 2]);
    }

    #[tokio::test]
    async fn traversal_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path().to_path_buf(), "http://media.test".into());
        let err = store.upload("../escape.mp4", vec![], "video/mp4").await.unwrap_err();
        assert_matches!(err, StorageError::InvalidKey(_));
    }
}
