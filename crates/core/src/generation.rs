//! Generation parameters, submission validation and failure classes.
//!
//! The HTTP layer deserializes a loosely typed [`SubmitGenerationRequest`]
//! and calls [`SubmitGenerationRequest::into_validated`], which reports
//! every bad field at once instead of failing on the first serde error.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{CoreError, FieldError};
use crate::prompt::{MAX_PROMPT_CHARS, MIN_PROMPT_CHARS};
use crate::types::{DbId, UserId};

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Veo accepts at most three reference ("ingredient") images per request.
pub const MAX_REFERENCE_IMAGES: usize = 3;
/// Maximum length of a client-supplied idempotency token.
pub const MAX_REQUEST_ID_LEN: usize = 128;
/// Maximum length of a negative prompt.
pub const MAX_NEGATIVE_PROMPT_CHARS: usize = 1000;

// ---------------------------------------------------------------------------
// Parameter enums
// ---------------------------------------------------------------------------

/// Clip length in seconds. Only 4, 6 and 8 second clips can be generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ClipDuration {
    Four,
    Six,
    Eight,
}

impl ClipDuration {
    pub const ALL: [ClipDuration; 3] = [Self::Four, Self::Six, Self::Eight];

    pub fn seconds(self) -> u8 {
        match self {
            Self::Four => 4,
            Self::Six => 6,
            Self::Eight => 8,
        }
    }
}

impl TryFrom<u8> for ClipDuration {
    type Error = String;

    fn try_from(secs: u8) -> Result<Self, Self::Error> {
        match secs {
            4 => Ok(Self::Four),
            6 => Ok(Self::Six),
            8 => Ok(Self::Eight),
            other => Err(format!("duration must be 4, 6 or 8 seconds, got {other}")),
        }
    }
}

impl From<ClipDuration> for u8 {
    fn from(d: ClipDuration) -> u8 {
        d.seconds()
    }
}

/// Output resolution. Ordered by quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "720p")]
    Hd720,
    #[serde(rename = "1080p")]
    Hd1080,
}

impl Resolution {
    pub const ALL: [Resolution; 2] = [Self::Hd720, Self::Hd1080];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hd720 => "720p",
            Self::Hd1080 => "1080p",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "720p" => Some(Self::Hd720),
            "1080p" => Some(Self::Hd1080),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
}

impl AspectRatio {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Landscape => "16:9",
            Self::Portrait => "9:16",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "16:9" => Some(Self::Landscape),
            "9:16" => Some(Self::Portrait),
            _ => None,
        }
    }
}

/// The immutable generation parameters of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub duration: ClipDuration,
    pub resolution: Resolution,
    pub aspect_ratio: AspectRatio,
}

// ---------------------------------------------------------------------------
// Failure classes
// ---------------------------------------------------------------------------

/// Why a generation ended in `failed`. Stored alongside the error message so
/// that exhausted retries can be told apart from permanent rejections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    ProviderTransient,
    ProviderPermanent,
    Timeout,
    Storage,
    Internal,
}

impl FailureClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ProviderTransient => "provider_transient",
            Self::ProviderPermanent => "provider_permanent",
            Self::Timeout => "timeout",
            Self::Storage => "storage",
            Self::Internal => "internal",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "provider_transient" => Some(Self::ProviderTransient),
            "provider_permanent" => Some(Self::ProviderPermanent),
            "timeout" => Some(Self::Timeout),
            "storage" => Some(Self::Storage),
            "internal" => Some(Self::Internal),
            _ => None,
        }
    }

    /// Whether another attempt may succeed.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::ProviderTransient | Self::Timeout | Self::Storage)
    }
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

fn default_include_audio() -> bool {
    true
}

/// Raw submission body for `POST /generations`.
///
/// Enumerated fields are plain strings/integers here so that a bad value
/// becomes a field-level `INVALID_REQUEST` message instead of a body
/// deserialization failure.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SubmitGenerationRequest {
    pub user_id: UserId,
    pub project_id: Option<DbId>,
    #[validate(length(
        min = 50,
        max = 2000,
        message = "prompt must be between 50 and 2000 characters"
    ))]
    pub prompt: String,
    #[validate(length(max = 1000, message = "negative_prompt must be at most 1000 characters"))]
    pub negative_prompt: Option<String>,
    pub duration: u8,
    pub resolution: String,
    pub aspect_ratio: Option<String>,
    #[serde(default)]
    #[validate(length(max = 3, message = "at most 3 reference images are allowed"))]
    pub reference_images: Vec<String>,
    #[serde(default = "default_include_audio")]
    pub include_audio: bool,
    #[validate(length(min = 1, max = 128, message = "request_id must be 1 to 128 characters"))]
    pub request_id: Option<String>,
}

/// A submission that passed validation, with typed parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSubmission {
    pub user_id: UserId,
    pub project_id: Option<DbId>,
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub params: GenerationParams,
    pub reference_images: Vec<String>,
    pub include_audio: bool,
    pub request_id: Option<String>,
}

impl SubmitGenerationRequest {
    /// Validate every field and return the typed submission, or an
    /// [`CoreError::InvalidRequest`] listing all problems found.
    pub fn into_validated(self) -> Result<ValidatedSubmission, CoreError> {
        let mut fields = match self.validate() {
            Ok(()) => Vec::new(),
            Err(errors) => match CoreError::from(errors) {
                CoreError::InvalidRequest(fields) => fields,
                _ => Vec::new(),
            },
        };

        let duration = ClipDuration::try_from(self.duration)
            .map_err(|msg| fields.push(FieldError::new("duration", msg)))
            .ok();

        let resolution = Resolution::parse(&self.resolution).or_else(|| {
            fields.push(FieldError::new(
                "resolution",
                format!("resolution must be 720p or 1080p, got '{}'", self.resolution),
            ));
            None
        });

        let aspect_ratio = match self.aspect_ratio.as_deref() {
            None => Some(AspectRatio::default()),
            Some(raw) => AspectRatio::parse(raw).or_else(|| {
                fields.push(FieldError::new(
                    "aspect_ratio",
                    format!("aspect_ratio must be 16:9 or 9:16, got '{raw}'"),
                ));
                None
            }),
        };

        for (i, image) in self.reference_images.iter().enumerate() {
            if !is_supported_locator(image) {
                fields.push(FieldError::new(
                    format!("reference_images[{i}]"),
                    "reference image must be an http(s):// or gs:// locator",
                ));
            }
        }

        if self.prompt.trim().chars().count() < MIN_PROMPT_CHARS
            && !fields.iter().any(|f| f.field == "prompt")
        {
            fields.push(FieldError::new(
                "prompt",
                format!("prompt must contain at least {MIN_PROMPT_CHARS} non-blank characters"),
            ));
        }

        match (duration, resolution, aspect_ratio) {
            (Some(duration), Some(resolution), Some(aspect_ratio)) if fields.is_empty() => {
                Ok(ValidatedSubmission {
                    user_id: self.user_id,
                    project_id: self.project_id,
                    prompt: self.prompt,
                    negative_prompt: self
                        .negative_prompt
                        .map(|n| n.trim().to_string())
                        .filter(|n| !n.is_empty()),
                    params: GenerationParams {
                        duration,
                        resolution,
                        aspect_ratio,
                    },
                    reference_images: self.reference_images,
                    include_audio: self.include_audio,
                    request_id: self.request_id,
                })
            }
            _ => Err(CoreError::InvalidRequest(fields)),
        }
    }
}

fn is_supported_locator(value: &str) -> bool {
    let v = value.trim();
    (v.starts_with("https://") || v.starts_with("http://") || v.starts_with("gs://"))
        && v.len() > "gs://".len()
        && v.len() <= MAX_PROMPT_CHARS
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn valid_request() -> SubmitGenerationRequest {
        SubmitGenerationRequest {
            user_id: 7,
            project_id: None,
            prompt: "close-up tracking shot | premium wireless earbuds | rotating slowly | white studio | cinematic".into(),
            negative_prompt: None,
            duration: 6,
            resolution: "1080p".into(),
            aspect_ratio: None,
            reference_images: vec![],
            include_audio: true,
            request_id: Some("req-1".into()),
        }
    }

    #[test]
    fn valid_request_produces_typed_params() {
        let v = valid_request().into_validated().unwrap();
        assert_eq!(v.params.duration, ClipDuration::Six);
        assert_eq!(v.params.resolution, Resolution::Hd1080);
        assert_eq!(v.params.aspect_ratio, AspectRatio::Landscape);
    }

    #[test]
    fn all_bad_fields_are_reported_together() {
        let mut req = valid_request();
        req.prompt = "too short".into();
        req.duration = 5;
        req.resolution = "4k".into();
        req.aspect_ratio = Some("1:1".into());

        let err = req.into_validated().unwrap_err();
        assert_matches!(err, CoreError::InvalidRequest(fields) => {
            let names: Vec<_> = fields.iter().map(|f| f.field.as_str()).collect();
            assert!(names.contains(&"prompt"));
            assert!(names.contains(&"duration"));
            assert!(names.contains(&"resolution"));
            assert!(names.contains(&"aspect_ratio"));
        });
    }

    #[test]
    fn overlong_prompt_is_rejected() {
        let mut req = valid_request();
        req.prompt = "a".repeat(2001);
        assert_matches!(req.into_validated(), Err(CoreError::InvalidRequest(_)));
    }

    #[test]
    fn whitespace_padded_prompt_is_rejected() {
        let mut req = valid_request();
        req.prompt = format!("{}short prompt{}", " ".repeat(40), " ".repeat(40));
        assert_matches!(req.into_validated(), Err(CoreError::InvalidRequest(fields)) => {
            assert_eq!(fields[0].field, "prompt");
        });
    }

    #[test]
    fn reference_images_must_be_locators() {
        let mut req = valid_request();
        req.reference_images = vec!["https://cdn.example.com/a.png".into(), "not a url".into()];
        assert_matches!(req.into_validated(), Err(CoreError::InvalidRequest(fields)) => {
            assert_eq!(fields.len(), 1);
            assert_eq!(fields[0].field, "reference_images[1]");
        });
    }

    #[test]
    fn too_many_reference_images_is_rejected() {
        let mut req = valid_request();
        req.reference_images = (0..4).map(|i| format!("gs://bucket/{i}.png")).collect();
        assert_matches!(req.into_validated(), Err(CoreError::InvalidRequest(_)));
    }

    #[test]
    fn blank_negative_prompt_becomes_none() {
        let mut req = valid_request();
        req.negative_prompt = Some("   ".into());
        assert_eq!(req.into_validated().unwrap().negative_prompt, None);
    }

    #[test]
    fn duration_serde_uses_seconds() {
        assert_eq!(serde_json::to_value(ClipDuration::Eight).unwrap(), 8);
        let d: ClipDuration = serde_json::from_value(serde_json::json!(4)).unwrap();
        assert_eq!(d, ClipDuration::Four);
        assert!(serde_json::from_value::<ClipDuration>(serde_json::json!(5)).is_err());
    }

    #[test]
    fn resolution_and_aspect_ratio_serde_names() {
        assert_eq!(serde_json::to_value(Resolution::Hd720).unwrap(), "720p");
        assert_eq!(serde_json::to_value(AspectRatio::Portrait).unwrap(), "9:16");
    }

    #[test]
    fn resolution_tiers_are_ordered() {
        assert!(Resolution::Hd720 < Resolution::Hd1080);
        assert!(ClipDuration::Four < ClipDuration::Eight);
    }

    #[test]
    fn failure_class_retryability() {
        assert!(FailureClass::ProviderTransient.is_retryable());
        assert!(FailureClass::Timeout.is_retryable());
        assert!(FailureClass::Storage.is_retryable());
        assert!(!FailureClass::ProviderPermanent.is_retryable());
        assert!(!FailureClass::Internal.is_retryable());
        assert_eq!(FailureClass::parse("storage"), Some(FailureClass::Storage));
    }
}
