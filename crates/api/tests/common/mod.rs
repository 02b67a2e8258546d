#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use veostudio_api::config::ServerConfig;
use veostudio_api::router::build_app_router;
use veostudio_api::state::AppState;
use veostudio_core::money::Money;
use veostudio_core::pricing::PricingTable;
use veostudio_core::provider::{
    ProviderError, ProviderOutput, ProviderRequest, VideoPayload, VideoProvider,
};
use veostudio_core::storage::{ArtifactStore, StorageError};
use veostudio_events::EventBus;
use veostudio_pipeline::clock::SystemClock;
use veostudio_pipeline::ledger::LedgerDefaults;
use veostudio_pipeline::{
    AdmissionService, GenerationWorker, PipelineConfig, Stores, TemplateLibrary,
};

/// A prompt that passes validation (over 50 characters, five segments).
pub const PROMPT: &str =
    "slow dolly shot | matte black smartwatch | rotating on a pedestal | dark studio | premium";

pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
    }
}

/// The app plus handles on the state behind it.
pub struct TestApp {
    pub router: Router,
    pub stores: Stores,
    pub events: Arc<EventBus>,
    pub pipeline: PipelineConfig,
}

/// Build the application router with the production middleware stack on
/// in-memory stores. New budget accounts get a $1.00 limit.
pub fn build_test_app() -> TestApp {
    let pipeline = PipelineConfig::default();
    let stores = Stores::in_memory(
        LedgerDefaults {
            limit: Money::from_cents(100),
            period_days: 30,
        },
        Arc::new(SystemClock),
    );
    let events = Arc::new(EventBus::default());
    let admission = AdmissionService::new(
        stores.clone(),
        PricingTable::default(),
        Arc::clone(&events),
        &pipeline,
    );

    let config = test_config();
    let state = AppState {
        admission: Arc::new(admission),
        templates: Arc::new(TemplateLibrary::new(Arc::clone(&stores.templates))),
        config: Arc::new(config.clone()),
    };

    TestApp {
        router: build_app_router(state, &config),
        stores,
        events,
        pipeline,
    }
}

impl TestApp {
    /// Process every queued job with a provider that always succeeds.
    pub async fn run_worker(&self) {
        let worker = GenerationWorker::new(
            "api-test-worker",
            self.stores.clone(),
            Arc::new(InstantProvider),
            Arc::new(MemoryArtifacts),
            Arc::clone(&self.events),
            &self.pipeline,
        );
        let cancel = CancellationToken::new();
        while worker.process_next(&cancel).await.unwrap() {}
    }
}

pub async fn send(app: &TestApp, request: Request<Body>) -> Response<Body> {
    app.router.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &TestApp, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json(app: &TestApp, uri: &str, json: serde_json::Value) -> Response<Body> {
    send_json(app, Method::POST, uri, json).await
}

pub async fn put_json(app: &TestApp, uri: &str, json: serde_json::Value) -> Response<Body> {
    send_json(app, Method::PUT, uri, json).await
}

async fn send_json(
    app: &TestApp,
    method: Method,
    uri: &str,
    json: serde_json::Value,
) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ---------------------------------------------------------------------------
// Provider and storage stand-ins
// ---------------------------------------------------------------------------

struct InstantProvider;

#[async_trait]
impl VideoProvider for InstantProvider {
    fn name(&self) -> &str {
        "instant"
    }

    async fn generate(&self, request: &ProviderRequest) -> Result<ProviderOutput, ProviderError> {
        Ok(ProviderOutput {
            provider_video_id: format!("op-{}", request.generation_id),
            video: VideoPayload::Bytes(vec![1u8; 16]),
        })
    }

    async fn download(&self, _locator: &str) -> Result<Vec<u8>, ProviderError> {
        Err(ProviderError::Permanent("no locators issued".into()))
    }
}

struct MemoryArtifacts;

#[async_trait]
impl ArtifactStore for MemoryArtifacts {
    fn name(&self) -> &str {
        "memory"
    }

    async fn upload(
        &self,
        key: &str,
        _bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, StorageError> {
        Ok(format!("https://cdn.test/{key}"))
    }
}
