//! Row model for the `generations` table.

use serde::Serialize;
use sqlx::FromRow;
use veostudio_core::error::CoreError;
use veostudio_core::generation::{
    AspectRatio, ClipDuration, FailureClass, GenerationParams, Resolution,
};
use veostudio_core::money::Money;
use veostudio_core::record::GenerationRecord;
use veostudio_core::status::{GenerationStatus, StatusId};
use veostudio_core::types::{DbId, Timestamp};

/// A row from the `generations` table. Amounts are cents.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Generation {
    pub id: DbId,
    pub user_id: DbId,
    pub project_id: Option<DbId>,
    pub request_id: String,
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub duration_seconds: i16,
    pub resolution: String,
    pub aspect_ratio: String,
    pub reference_images: Vec<String>,
    pub include_audio: bool,
    pub estimated_cost: i64,
    pub actual_cost: Option<i64>,
    pub estimated_tokens: i32,
    pub status_id: StatusId,
    pub video_url: Option<String>,
    pub error_message: Option<String>,
    pub error_class: Option<String>,
    pub attempt_count: i32,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}

impl TryFrom<Generation> for GenerationRecord {
    type Error = CoreError;

    fn try_from(row: Generation) -> Result<Self, Self::Error> {
        let id = row.id;
        let corrupt =
            |what: &str| CoreError::Internal(format!("generation {id} has invalid {what}"));

        let duration = u8::try_from(row.duration_seconds)
            .ok()
            .and_then(|d| ClipDuration::try_from(d).ok())
            .ok_or_else(|| corrupt("duration_seconds"))?;
        let resolution = Resolution::parse(&row.resolution).ok_or_else(|| corrupt("resolution"))?;
        let aspect_ratio =
            AspectRatio::parse(&row.aspect_ratio).ok_or_else(|| corrupt("aspect_ratio"))?;
        let status = GenerationStatus::from_id(row.status_id).ok_or_else(|| corrupt("status_id"))?;
        let error_class = match row.error_class.as_deref() {
            None => None,
            Some(raw) => Some(FailureClass::parse(raw).ok_or_else(|| corrupt("error_class"))?),
        };

        Ok(GenerationRecord {
            id: row.id,
            user_id: row.user_id,
            project_id: row.project_id,
            request_id: row.request_id,
            prompt: row.prompt,
            negative_prompt: row.negative_prompt,
            params: GenerationParams {
                duration,
                resolution,
                aspect_ratio,
            },
            reference_images: row.reference_images,
            include_audio: row.include_audio,
            estimated_cost: Money::from_cents(row.estimated_cost),
            actual_cost: row.actual_cost.map(Money::from_cents),
            estimated_tokens: u32::try_from(row.estimated_tokens).unwrap_or(0),
            status,
            video_url: row.video_url,
            error_message: row.error_message,
            error_class,
            attempt_count: u32::try_from(row.attempt_count).unwrap_or(0),
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}
