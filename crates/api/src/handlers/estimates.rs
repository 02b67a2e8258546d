//! Handlers for cost estimates and the pricing sheet.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;
use veostudio_core::error::{CoreError, FieldError};
use veostudio_core::generation::{ClipDuration, Resolution};
use veostudio_core::pricing::{estimated_processing_secs, CostBreakdown, Extras};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct EstimateRequest {
    pub duration: u8,
    pub resolution: String,
    #[serde(default = "one")]
    #[validate(range(min = 1, max = 1000, message = "quantity must be between 1 and 1000"))]
    pub quantity: u32,
    #[serde(default)]
    #[validate(range(max = 3, message = "at most 3 reference images are allowed"))]
    pub reference_images: u32,
    #[serde(default = "yes")]
    pub include_audio: bool,
}

fn one() -> u32 {
    1
}

fn yes() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct EstimateResponse {
    #[serde(flatten)]
    pub breakdown: CostBreakdown,
    pub resolution: Resolution,
    pub duration_seconds: u8,
    /// Expected wall time per video, in seconds.
    pub estimated_processing_secs: u32,
}

// ---------------------------------------------------------------------------
// POST /estimates
// ---------------------------------------------------------------------------

pub async fn estimate(
    State(state): State<AppState>,
    body: Result<Json<EstimateRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(request) = body?;
    let (resolution, duration) = parse_params(&request)?;

    let breakdown = state.admission.pricing().estimate(
        resolution,
        duration,
        Extras {
            reference_images: request.reference_images,
            audio: request.include_audio,
        },
        request.quantity,
    );

    Ok(Json(DataResponse {
        data: EstimateResponse {
            breakdown,
            resolution,
            duration_seconds: duration.seconds(),
            estimated_processing_secs: estimated_processing_secs(resolution, duration),
        },
    }))
}

// ---------------------------------------------------------------------------
// GET /pricing
// ---------------------------------------------------------------------------

pub async fn pricing_sheet(State(state): State<AppState>) -> impl IntoResponse {
    Json(DataResponse {
        data: state.admission.pricing().sheet(),
    })
}

/// Collect every field problem before rejecting, like submission does.
fn parse_params(request: &EstimateRequest) -> Result<(Resolution, ClipDuration), CoreError> {
    let mut fields = match request.validate() {
        Ok(()) => Vec::new(),
        Err(errors) => match CoreError::from(errors) {
            CoreError::InvalidRequest(fields) => fields,
            _ => Vec::new(),
        },
    };

    let duration = ClipDuration::try_from(request.duration)
        .map_err(|msg| fields.push(FieldError::new("duration", msg)))
        .ok();
    let resolution = Resolution::parse(&request.resolution);
    if resolution.is_none() {
        fields.push(FieldError::new(
            "resolution",
            format!("resolution must be 720p or 1080p, got '{}'", request.resolution),
        ));
    }

    match (resolution, duration) {
        (Some(resolution), Some(duration)) if fields.is_empty() => Ok((resolution, duration)),
        _ => Err(CoreError::InvalidRequest(fields)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use veostudio_core::generation::MAX_REFERENCE_IMAGES;

    fn request(duration: u8, resolution: &str, quantity: u32) -> EstimateRequest {
        EstimateRequest {
            duration,
            resolution: resolution.into(),
            quantity,
            reference_images: 0,
            include_audio: false,
        }
    }

    #[test]
    fn accepts_supported_params() {
        let (resolution, duration) = parse_params(&request(8, "720p", 5)).unwrap();
        assert_eq!(resolution, Resolution::Hd720);
        assert_eq!(duration, ClipDuration::Eight);
    }

    #[test]
    fn reports_every_bad_field() {
        let err = parse_params(&request(5, "4k", 0)).unwrap_err();
        assert_matches!(err, CoreError::InvalidRequest(fields) => {
            let names: Vec<_> = fields.iter().map(|f| f.field.as_str()).collect();
            assert!(names.contains(&"duration"));
            assert!(names.contains(&"resolution"));
            assert!(names.contains(&"quantity"));
        });
    }

    #[test]
    fn quantity_is_capped_at_one_thousand() {
        assert!(parse_params(&request(4, "720p", 1000)).is_ok());
        assert!(parse_params(&request(4, "720p", 1001)).is_err());
    }

    #[test]
    fn reference_image_cap_matches_submission() {
        let mut req = request(4, "720p", 1);
        req.reference_images = MAX_REFERENCE_IMAGES as u32 + 1;
        assert!(parse_params(&req).is_err());
    }
}
