//! [`VideoProvider`] implementation backed by the Veo REST API.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use veostudio_core::prompt::DEFAULT_NEGATIVE_PROMPT;
use veostudio_core::provider::{
    ProviderError, ProviderOutput, ProviderRequest, VideoPayload, VideoProvider,
};

use crate::api::{Operation, VeoApi, VeoApiError};
use crate::config::VeoConfig;

/// Longest slice of conditioning context appended to the prompt.
const MAX_CONTEXT_CHARS: usize = 1000;

/// `google.rpc.Code` values worth retrying: DEADLINE_EXCEEDED,
/// RESOURCE_EXHAUSTED, ABORTED, INTERNAL, UNAVAILABLE.
const TRANSIENT_RPC_CODES: [i32; 5] = [4, 8, 10, 13, 14];

pub struct VeoClient {
    api: VeoApi,
    model: String,
    poll_interval: Duration,
}

impl VeoClient {
    pub fn new(config: &VeoConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| ProviderError::Permanent(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            api: VeoApi::with_client(http, config.base_url.clone(), config.api_key.clone()),
            model: config.model.clone(),
            poll_interval: config.poll_interval,
        })
    }

    /// Poll an operation until it reports `done`.
    ///
    /// There is no poll limit here; the worker wraps each attempt in a
    /// timeout and dropping this future stops polling.
    async fn wait_for(&self, mut operation: Operation) -> Result<Operation, ProviderError> {
        let mut polls = 0u32;
        while !operation.done {
            tokio::time::sleep(self.poll_interval).await;
            polls += 1;
            operation = self
                .api
                .get_operation(&operation.name)
                .await
                .map_err(classify_api_error)?;
            tracing::debug!(operation = %operation.name, polls, done = operation.done, "Polled Veo operation");
        }
        Ok(operation)
    }
}

#[async_trait]
impl VideoProvider for VeoClient {
    fn name(&self) -> &str {
        "veo"
    }

    async fn generate(&self, request: &ProviderRequest) -> Result<ProviderOutput, ProviderError> {
        let body = build_request_body(request);
        let operation = self
            .api
            .start_generation(&self.model, &body)
            .await
            .map_err(classify_api_error)?;

        tracing::info!(
            generation_id = request.generation_id,
            operation = %operation.name,
            model = %self.model,
            "Veo generation started",
        );

        let finished = self.wait_for(operation).await?;
        let uri = video_uri(&finished)?;
        Ok(ProviderOutput {
            provider_video_id: finished.name,
            video: VideoPayload::Locator(uri),
        })
    }

    async fn download(&self, locator: &str) -> Result<Vec<u8>, ProviderError> {
        self.api.download(locator).await.map_err(classify_api_error)
    }
}

// ---------------------------------------------------------------------------
// Request / response mapping
// ---------------------------------------------------------------------------

/// Build the `predictLongRunning` request body.
pub fn build_request_body(request: &ProviderRequest) -> serde_json::Value {
    let reference_images: Vec<serde_json::Value> = request
        .reference_images
        .iter()
        .map(|locator| {
            let image = if locator.starts_with("gs://") {
                json!({ "gcsUri": locator })
            } else {
                json!({ "uri": locator })
            };
            json!({ "image": image, "referenceType": "asset" })
        })
        .collect();

    let mut instance = json!({ "prompt": compose_prompt(&request.prompt, &request.context) });
    if !reference_images.is_empty() {
        instance["referenceImages"] = json!(reference_images);
    }

    json!({
        "instances": [instance],
        "parameters": {
            "aspectRatio": request.params.aspect_ratio.as_str(),
            "resolution": request.params.resolution.as_str(),
            "durationSeconds": request.params.duration.seconds(),
            "negativePrompt": request
                .negative_prompt
                .as_deref()
                .unwrap_or(DEFAULT_NEGATIVE_PROMPT),
            "generateAudio": request.include_audio,
        }
    })
}

fn compose_prompt(prompt: &str, context: &str) -> String {
    let context = context.trim();
    if context.is_empty() {
        return prompt.to_string();
    }
    let excerpt: String = context.chars().take(MAX_CONTEXT_CHARS).collect();
    format!("{prompt}\n\n{excerpt}")
}

/// Extract the video URI from a finished operation.
fn video_uri(operation: &Operation) -> Result<String, ProviderError> {
    if let Some(error) = &operation.error {
        let message = format!("operation failed ({}): {}", error.code, error.message);
        return Err(if TRANSIENT_RPC_CODES.contains(&error.code) {
            ProviderError::Transient(message)
        } else {
            ProviderError::Permanent(message)
        });
    }

    let response = operation
        .response
        .as_ref()
        .ok_or_else(|| ProviderError::Transient("operation finished without a response".into()))?;
    let body = &response["generateVideoResponse"];

    let uri = body["generatedSamples"][0]["video"]["uri"]
        .as_str()
        .or_else(|| response["generatedVideos"][0]["video"]["uri"].as_str());
    if let Some(uri) = uri {
        return Ok(uri.to_string());
    }

    // Safety filters remove the sample and list why.
    if let Some(reasons) = body["raiMediaFilteredReasons"].as_array() {
        let reasons: Vec<&str> = reasons.iter().filter_map(|r| r.as_str()).collect();
        return Err(ProviderError::Permanent(format!(
            "video blocked by safety filters: {}",
            reasons.join("; ")
        )));
    }
    Err(ProviderError::Permanent(
        "operation response contained no video".into(),
    ))
}

fn classify_api_error(error: VeoApiError) -> ProviderError {
    match error {
        VeoApiError::ApiError { status, body } => ProviderError::from_status(status, body),
        VeoApiError::Request(e) if e.is_decode() => {
            ProviderError::Permanent(format!("malformed Veo response: {e}"))
        }
        VeoApiError::Request(e) => ProviderError::Transient(format!("Veo request failed: {e}")),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use veostudio_core::generation::{AspectRatio, ClipDuration, GenerationParams, Resolution};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> ProviderRequest {
        ProviderRequest {
            generation_id: 5,
            prompt: "tracking shot | smartwatch | rotating | studio | cinematic".into(),
            negative_prompt: None,
            params: GenerationParams {
                duration: ClipDuration::Six,
                resolution: Resolution::Hd1080,
                aspect_ratio: AspectRatio::Portrait,
            },
            reference_images: vec!["gs://refs/watch.png".into()],
            include_audio: true,
            context: String::new(),
        }
    }

    fn client(server: &MockServer) -> VeoClient {
        let mut config = VeoConfig::new("test-key");
        config.base_url = server.uri();
        config.poll_interval = Duration::from_millis(1);
        VeoClient::new(&config).unwrap()
    }

    #[test]
    fn request_body_carries_parameters() {
        let body = build_request_body(&request());
        let params = &body["parameters"];
        assert_eq!(params["aspectRatio"], "9:16");
        assert_eq!(params["resolution"], "1080p");
        assert_eq!(params["durationSeconds"], 6);
        assert_eq!(params["negativePrompt"], DEFAULT_NEGATIVE_PROMPT);
        assert_eq!(
            body["instances"][0]["referenceImages"][0]["image"]["gcsUri"],
            "gs://refs/watch.png"
        );
    }

    #[test]
    fn context_is_appended_to_prompt() {
        let mut req = request();
        req.context = "Keep the product in focus.".into();
        let body = build_request_body(&req);
        let prompt = body["instances"][0]["prompt"].as_str().unwrap();
        assert!(prompt.starts_with("tracking shot"));
        assert!(prompt.ends_with("Keep the product in focus."));
    }

    #[tokio::test]
    async fn generate_polls_until_done() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/veo-3.1-generate-preview:predictLongRunning"))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "name": "operations/op-1" })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/operations/op-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "operations/op-1",
                "done": true,
                "response": {
                    "generateVideoResponse": {
                        "generatedSamples": [{ "video": { "uri": "https://files/v1.mp4" } }]
                    }
                }
            })))
            .mount(&server)
            .await;

        let output = client(&server).generate(&request()).await.unwrap();
        assert_eq!(output.provider_video_id, "operations/op-1");
        assert_eq!(output.video, VideoPayload::Locator("https://files/v1.mp4".into()));
    }

    #[tokio::test]
    async fn rate_limit_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
            .mount(&server)
            .await;

        let err = client(&server).generate(&request()).await.unwrap_err();
        assert_matches!(err, ProviderError::Transient(msg) => assert!(msg.contains("429")));
    }

    #[tokio::test]
    async fn bad_request_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid prompt"))
            .mount(&server)
            .await;

        let err = client(&server).generate(&request()).await.unwrap_err();
        assert_matches!(err, ProviderError::Permanent(_));
    }

    #[tokio::test]
    async fn operation_error_is_classified_by_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "operations/op-2",
                "done": true,
                "error": { "code": 3, "message": "prompt violates policy" }
            })))
            .mount(&server)
            .await;

        let err = client(&server).generate(&request()).await.unwrap_err();
        assert_matches!(err, ProviderError::Permanent(msg) => assert!(msg.contains("policy")));
    }

    #[tokio::test]
    async fn filtered_video_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "operations/op-3",
                "done": true,
                "response": {
                    "generateVideoResponse": { "raiMediaFilteredReasons": ["celebrity likeness"] }
                }
            })))
            .mount(&server)
            .await;

        let err = client(&server).generate(&request()).await.unwrap_err();
        assert_matches!(err, ProviderError::Permanent(msg) => assert!(msg.contains("celebrity")));
    }

    #[tokio::test]
    async fn download_returns_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/v1.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .mount(&server)
            .await;

        let bytes = client(&server)
            .download(&format!("{}/files/v1.mp4", server.uri()))
            .await
            .unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
    }
}
