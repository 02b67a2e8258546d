//! The durable generation record and its polling view.

use serde::Serialize;

use crate::generation::{FailureClass, GenerationParams};
use crate::money::Money;
use crate::pricing::estimated_processing_secs;
use crate::status::GenerationStatus;
use crate::types::{DbId, Timestamp, UserId};

/// Fields fixed at admission. Nothing here changes after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewGeneration {
    pub user_id: UserId,
    pub project_id: Option<DbId>,
    pub request_id: String,
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub params: GenerationParams,
    pub reference_images: Vec<String>,
    pub include_audio: bool,
    pub estimated_cost: Money,
    pub estimated_tokens: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRecord {
    pub id: DbId,
    pub user_id: UserId,
    pub project_id: Option<DbId>,
    pub request_id: String,
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub params: GenerationParams,
    pub reference_images: Vec<String>,
    pub include_audio: bool,
    pub estimated_cost: Money,
    pub actual_cost: Option<Money>,
    pub estimated_tokens: u32,
    pub status: GenerationStatus,
    pub video_url: Option<String>,
    pub error_message: Option<String>,
    pub error_class: Option<FailureClass>,
    pub attempt_count: u32,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}

impl GenerationRecord {
    /// Build the initial `queued` record for a new submission.
    pub fn queued(id: DbId, new: NewGeneration, created_at: Timestamp) -> Self {
        Self {
            id,
            user_id: new.user_id,
            project_id: new.project_id,
            request_id: new.request_id,
            prompt: new.prompt,
            negative_prompt: new.negative_prompt,
            params: new.params,
            reference_images: new.reference_images,
            include_audio: new.include_audio,
            estimated_cost: new.estimated_cost,
            actual_cost: None,
            estimated_tokens: new.estimated_tokens,
            status: GenerationStatus::Queued,
            video_url: None,
            error_message: None,
            error_class: None,
            attempt_count: 0,
            created_at,
            started_at: None,
            completed_at: None,
        }
    }

    /// Exactly one of: completed with a url and cost, failed with a message,
    /// or in flight with neither.
    pub fn is_consistent(&self) -> bool {
        match self.status {
            GenerationStatus::Completed => {
                self.video_url.is_some()
                    && self.actual_cost.is_some()
                    && self.error_message.is_none()
            }
            GenerationStatus::Failed => {
                self.error_message.is_some() && self.video_url.is_none() && self.actual_cost.is_none()
            }
            GenerationStatus::Queued | GenerationStatus::Processing => {
                self.video_url.is_none() && self.error_message.is_none() && self.actual_cost.is_none()
            }
        }
    }

    pub fn view(&self) -> GenerationView {
        GenerationView {
            video_id: self.id,
            request_id: self.request_id.clone(),
            user_id: self.user_id,
            project_id: self.project_id,
            status: self.status,
            prompt: self.prompt.clone(),
            duration: self.params.duration.seconds(),
            resolution: self.params.resolution.as_str(),
            aspect_ratio: self.params.aspect_ratio.as_str(),
            estimated_cost: self.estimated_cost,
            actual_cost: self.actual_cost,
            estimated_tokens: self.estimated_tokens,
            estimated_duration: estimated_processing_secs(
                self.params.resolution,
                self.params.duration,
            ),
            video_url: self.video_url.clone(),
            error_message: self.error_message.clone(),
            error_class: self.error_class,
            attempt_count: self.attempt_count,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }
}

/// What a polling client sees for one generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationView {
    pub video_id: DbId,
    pub request_id: String,
    pub user_id: UserId,
    pub project_id: Option<DbId>,
    pub status: GenerationStatus,
    pub prompt: String,
    pub duration: u8,
    pub resolution: &'static str,
    pub aspect_ratio: &'static str,
    pub estimated_cost: Money,
    pub actual_cost: Option<Money>,
    pub estimated_tokens: u32,
    /// Expected seconds from admission to a stored video.
    pub estimated_duration: u32,
    pub video_url: Option<String>,
    pub error_message: Option<String>,
    pub error_class: Option<FailureClass>,
    pub attempt_count: u32,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}
