//! Boundary to the external video generation provider.
//!
//! The worker only sees [`VideoProvider`]; the Veo HTTP client lives in its
//! own crate and tests substitute scripted fakes.

use async_trait::async_trait;

use crate::generation::{FailureClass, GenerationParams};
use crate::job::GenerationJobV1;
use crate::types::DbId;

/// Input for one provider call.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRequest {
    pub generation_id: DbId,
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub params: GenerationParams,
    pub reference_images: Vec<String>,
    pub include_audio: bool,
    /// Conditioning context sent alongside the prompt.
    pub context: String,
}

impl From<&GenerationJobV1> for ProviderRequest {
    fn from(job: &GenerationJobV1) -> Self {
        Self {
            generation_id: job.generation_id,
            prompt: job.prompt.clone(),
            negative_prompt: job.negative_prompt.clone(),
            params: job.params,
            reference_images: job.reference_images.clone(),
            include_audio: job.include_audio,
            context: job.context.clone(),
        }
    }
}

/// The rendered clip, either inline or at a provider-hosted location.
#[derive(Debug, Clone, PartialEq)]
pub enum VideoPayload {
    Bytes(Vec<u8>),
    Locator(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderOutput {
    pub provider_video_id: String,
    pub video: VideoPayload,
}

/// Provider failures, classified by whether retrying can help.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    /// Rate limiting, 5xx responses, network errors.
    #[error("transient provider error: {0}")]
    Transient(String),

    /// Content policy rejections, malformed requests, auth failures.
    #[error("permanent provider error: {0}")]
    Permanent(String),
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    pub fn failure_class(&self) -> FailureClass {
        match self {
            Self::Transient(_) => FailureClass::ProviderTransient,
            Self::Permanent(_) => FailureClass::ProviderPermanent,
        }
    }

    /// Classify an HTTP status returned by a provider.
    ///
    /// `408`, `429` and every `5xx` are worth retrying; other `4xx` are not.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = format!("HTTP {status}: {}", message.into());
        match status {
            408 | 429 | 500..=599 => Self::Transient(message),
            _ => Self::Permanent(message),
        }
    }
}

#[async_trait]
pub trait VideoProvider: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Render one clip. Implementations must not retry internally; the
    /// worker owns the retry budget.
    async fn generate(&self, request: &ProviderRequest) -> Result<ProviderOutput, ProviderError>;

    /// Fetch a clip the provider returned by locator.
    async fn download(&self, locator: &str) -> Result<Vec<u8>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(ProviderError::from_status(429, "quota").is_transient());
        assert!(ProviderError::from_status(503, "unavailable").is_transient());
        assert!(ProviderError::from_status(408, "timeout").is_transient());
        assert!(!ProviderError::from_status(400, "bad prompt").is_transient());
        assert!(!ProviderError::from_status(403, "forbidden").is_transient());
    }

    #[test]
    fn failure_class_follows_kind() {
        assert_eq!(
            ProviderError::Permanent("policy".into()).failure_class(),
            FailureClass::ProviderPermanent
        );
        assert_eq!(
            ProviderError::Transient("busy".into()).to_string(),
            "transient provider error: busy"
        );
    }
}
