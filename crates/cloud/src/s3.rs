//! S3-backed artifact store.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use veostudio_core::storage::{check_key, ArtifactStore, StorageError};

use crate::public_url;

pub struct S3ArtifactStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_base_url: String,
}

impl S3ArtifactStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: String, public_base_url: String) -> Self {
        Self {
            client,
            bucket,
            public_base_url,
        }
    }
}

#[async_trait]
impl ArtifactStore for S3ArtifactStore {
    fn name(&self) -> &str {
        "s3"
    }

    async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        check_key(key)?;
        let size = bytes.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| {
                StorageError::Backend(format!(
                    "S3 put_object failed: {}",
                    aws_sdk_s3::error::DisplayErrorContext(&e)
                ))
            })?;

        tracing::debug!(bucket = %self.bucket, key, size, "Stored artifact in S3");
        Ok(public_url(&self.public_base_url, key))
    }
}
