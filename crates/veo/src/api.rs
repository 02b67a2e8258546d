//! REST client for the Gemini API video endpoints.
//!
//! Generation is a long-running operation: `POST
//! /models/{model}:predictLongRunning` returns an operation name which is
//! polled with `GET /{name}` until `done` is set.

use serde::Deserialize;

/// Header carrying the API key on every request.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// HTTP client for the Gemini API.
pub struct VeoApi {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

/// A long-running operation as returned by submit and poll.
#[derive(Debug, Clone, Deserialize)]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    pub error: Option<OperationError>,
    pub response: Option<serde_json::Value>,
}

/// `google.rpc.Status` attached to a failed operation.
#[derive(Debug, Clone, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

/// Errors from the REST layer.
#[derive(Debug, thiserror::Error)]
pub enum VeoApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API returned a non-2xx status code.
    #[error("Veo API error ({status}): {body}")]
    ApiError { status: u16, body: String },
}

impl VeoApi {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, api_key)
    }

    /// Reuse an existing [`reqwest::Client`] (shared pool, custom timeouts).
    pub fn with_client(client: reqwest::Client, base_url: String, api_key: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Start a generation and return the pending operation.
    pub async fn start_generation(
        &self,
        model: &str,
        body: &serde_json::Value,
    ) -> Result<Operation, VeoApiError> {
        let response = self
            .client
            .post(format!("{}/models/{model}:predictLongRunning", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .json(body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Fetch the current state of an operation.
    pub async fn get_operation(&self, name: &str) -> Result<Operation, VeoApiError> {
        let response = self
            .client
            .get(format!("{}/{}", self.base_url, name.trim_start_matches('/')))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Download a generated file. The API key is required for Gemini file
    /// URIs; the redirect to storage is followed by reqwest.
    pub async fn download(&self, uri: &str) -> Result<Vec<u8>, VeoApiError> {
        let response = self
            .client
            .get(uri)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    // ---- private helpers ----

    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, VeoApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(VeoApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, VeoApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}
