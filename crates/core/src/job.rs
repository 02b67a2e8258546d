//! Versioned payload carried by generation queue entries.
//!
//! Payloads are serialized as internally tagged JSON (`{"version": 1, ...}`)
//! so that a worker can reject entries written by a newer producer instead
//! of misreading them.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::generation::{GenerationParams, MAX_REFERENCE_IMAGES};
use crate::money::Money;
use crate::types::DbId;

/// Highest payload version this build understands.
pub const CURRENT_PAYLOAD_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "version")]
pub enum GenerationJobPayload {
    #[serde(rename = "1")]
    V1(GenerationJobV1),
}

/// Everything a worker needs to run one generation without re-reading the
/// submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationJobV1 {
    pub generation_id: DbId,
    pub prompt: String,
    pub negative_prompt: Option<String>,
    #[serde(flatten)]
    pub params: GenerationParams,
    #[serde(default)]
    pub reference_images: Vec<String>,
    pub include_audio: bool,
    /// Conditioning context passed to the provider alongside the prompt.
    #[serde(default)]
    pub context: String,
    pub estimated_cost: Money,
}

impl GenerationJobPayload {
    pub fn v1(job: GenerationJobV1) -> Self {
        Self::V1(job)
    }

    pub fn version(&self) -> u32 {
        match self {
            Self::V1(_) => 1,
        }
    }

    pub fn generation_id(&self) -> DbId {
        match self {
            Self::V1(job) => job.generation_id,
        }
    }

    /// Decode a stored payload. Unknown versions and malformed bodies are
    /// reported as [`CoreError::InvalidRequest`] on `payload`.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, CoreError> {
        let payload: Self = serde_json::from_value(value.clone()).map_err(|e| {
            let version = value.get("version").cloned().unwrap_or_default();
            CoreError::invalid("payload", format!("unreadable job payload (version {version}): {e}"))
        })?;
        payload.validate()?;
        Ok(payload)
    }

    pub fn to_json(&self) -> Result<serde_json::Value, CoreError> {
        serde_json::to_value(self)
            .map_err(|e| CoreError::Internal(format!("failed to encode job payload: {e}")))
    }

    /// Structural checks a worker runs before touching the provider.
    pub fn validate(&self) -> Result<(), CoreError> {
        match self {
            Self::V1(job) => {
                if job.generation_id <= 0 {
                    return Err(CoreError::invalid("generation_id", "must be positive"));
                }
                if job.prompt.trim().is_empty() {
                    return Err(CoreError::invalid("prompt", "must not be empty"));
                }
                if job.reference_images.len() > MAX_REFERENCE_IMAGES {
                    return Err(CoreError::invalid(
                        "reference_images",
                        format!("at most {MAX_REFERENCE_IMAGES} reference images"),
                    ));
                }
                if job.estimated_cost.is_negative() {
                    return Err(CoreError::invalid("estimated_cost", "must not be negative"));
                }
                Ok(())
            }
        }
    }
}
