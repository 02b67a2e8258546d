//! Generation worker: runs one leased queue entry to a terminal state.
//!
//! Per entry the worker decodes the payload, skips records that already
//! finished, marks the record `processing`, then loops over attempts. Each
//! attempt renews the lease, counts the attempt on the record, then renders
//! and uploads under one [`PipelineConfig::attempt_timeout`] deadline.
//! Retryable failures (transient provider errors, timeouts, storage errors)
//! back off per the [`RetryPolicy`]; anything else fails the record at once.
//! Each failure is recorded on the queue entry, so a later delivery that
//! finds the retry budget spent fails the record with that error.
//!
//! A rendered clip that fails to upload is kept and re-uploaded on the next
//! attempt, so the provider is not asked to render it again.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use veostudio_core::generation::FailureClass;
use veostudio_core::job::{GenerationJobPayload, GenerationJobV1};
use veostudio_core::provider::{ProviderError, ProviderRequest, VideoPayload, VideoProvider};
use veostudio_core::record::GenerationRecord;
use veostudio_core::retry::RetryPolicy;
use veostudio_core::storage::{video_key, ArtifactStore};
use veostudio_core::types::{DbId, UserId};
use veostudio_events::bus::{
    GENERATION_ATTEMPT_FAILED, GENERATION_COMPLETED, GENERATION_FAILED, GENERATION_PROCESSING,
};
use veostudio_events::{EventBus, GenerationEvent};

use crate::clock::log_millis;
use crate::config::PipelineConfig;
use crate::error::StoreError;
use crate::queue::Lease;
use crate::store::Stores;

const VIDEO_CONTENT_TYPE: &str = "video/mp4";

/// A failed attempt, classified.
#[derive(Debug, Clone, PartialEq)]
struct AttemptError {
    class: FailureClass,
    message: String,
}

/// How the attempt loop ended.
#[derive(Debug)]
enum Outcome {
    Stored(String),
    Failed(AttemptError),
    /// Shutdown was requested during a backoff.
    Cancelled,
    /// Another worker now holds the entry.
    LeaseLost,
}

#[derive(Clone)]
pub struct GenerationWorker {
    id: String,
    stores: Stores,
    provider: Arc<dyn VideoProvider>,
    artifacts: Arc<dyn ArtifactStore>,
    events: Arc<EventBus>,
    retry: RetryPolicy,
    attempt_timeout: Duration,
    lease_for: Duration,
}

impl GenerationWorker {
    pub fn new(
        id: impl Into<String>,
        stores: Stores,
        provider: Arc<dyn VideoProvider>,
        artifacts: Arc<dyn ArtifactStore>,
        events: Arc<EventBus>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            id: id.into(),
            stores,
            provider,
            artifacts,
            events,
            retry: config.retry.clone(),
            attempt_timeout: config.attempt_timeout,
            lease_for: config.lease_duration(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// A copy of this worker under a different id.
    pub fn with_id(&self, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..self.clone()
        }
    }

    /// Lease and process one entry. Returns `false` when the queue was empty.
    pub async fn process_next(&self, cancel: &CancellationToken) -> Result<bool, StoreError> {
        let Some(lease) = self.stores.queue.lease(&self.id, self.lease_for).await? else {
            return Ok(false);
        };
        tracing::debug!(
            worker = %self.id,
            job_id = lease.job_id,
            generation_id = lease.generation_id,
            delivery = lease.delivery,
            "Leased generation job",
        );
        self.handle(&lease, cancel).await?;
        Ok(true)
    }

    /// Run a leased entry to completion, failure or cancellation.
    pub async fn handle(&self, lease: &Lease, cancel: &CancellationToken) -> Result<(), StoreError> {
        let job = match GenerationJobPayload::from_json(&lease.payload) {
            Ok(GenerationJobPayload::V1(job)) => job,
            Err(e) => {
                let message = format!("unreadable job payload: {e}");
                tracing::warn!(job_id = lease.job_id, generation_id = lease.generation_id, error = %e, "Dead-lettering job");
                let failed = self
                    .stores
                    .generations
                    .fail(lease.generation_id, FailureClass::Internal, &message)
                    .await?;
                if failed {
                    self.publish_failed(lease.generation_id, None, FailureClass::Internal, &message);
                }
                self.stores.queue.dead_letter(lease, &message).await?;
                return Ok(());
            }
        };

        let Some(record) = self.stores.generations.find_by_id(job.generation_id).await? else {
            let message = format!("generation {} does not exist", job.generation_id);
            tracing::warn!(job_id = lease.job_id, generation_id = job.generation_id, "Dead-lettering job for missing generation");
            self.stores.queue.dead_letter(lease, &message).await?;
            return Ok(());
        };

        if record.status.is_terminal() {
            tracing::info!(generation_id = record.id, status = %record.status, "Generation already finished, skipping");
            self.stores.queue.ack(lease).await?;
            return Ok(());
        }

        if !self.stores.generations.mark_processing(record.id).await? {
            tracing::warn!(generation_id = record.id, "Generation could not be claimed, skipping");
            self.stores.queue.ack(lease).await?;
            return Ok(());
        }
        self.events.publish(
            GenerationEvent::new(GENERATION_PROCESSING)
                .for_generation(record.id)
                .with_user(record.user_id)
                .with_payload(json!({ "worker": self.id, "delivery": lease.delivery })),
        );

        match self.run_attempts(lease, &job, &record, cancel).await? {
            Outcome::Stored(video_url) => {
                // The charge is the estimate reserved at admission.
                let actual_cost = job.estimated_cost;
                if self
                    .stores
                    .generations
                    .complete(record.id, &video_url, actual_cost)
                    .await?
                {
                    tracing::info!(generation_id = record.id, video_url = %video_url, cost = %actual_cost, "Generation completed");
                    self.events.publish(
                        GenerationEvent::new(GENERATION_COMPLETED)
                            .for_generation(record.id)
                            .with_user(record.user_id)
                            .with_payload(json!({
                                "video_url": video_url,
                                "actual_cost": actual_cost,
                            })),
                    );
                }
                self.stores.queue.ack(lease).await?;
            }
            Outcome::Failed(error) => {
                tracing::warn!(
                    generation_id = record.id,
                    error_class = error.class.as_str(),
                    error = %error.message,
                    "Generation failed",
                );
                if self
                    .stores
                    .generations
                    .fail(record.id, error.class, &error.message)
                    .await?
                {
                    self.publish_failed(record.id, Some(record.user_id), error.class, &error.message);
                }
                self.stores.queue.ack(lease).await?;
            }
            Outcome::Cancelled => {
                tracing::info!(generation_id = record.id, "Worker cancelled, leaving job for redelivery");
            }
            Outcome::LeaseLost => {
                tracing::warn!(generation_id = record.id, job_id = lease.job_id, "Lease lost, abandoning job");
            }
        }
        Ok(())
    }

    // ---- private helpers ----

    async fn run_attempts(
        &self,
        lease: &Lease,
        job: &GenerationJobV1,
        record: &GenerationRecord,
        cancel: &CancellationToken,
    ) -> Result<Outcome, StoreError> {
        let request = ProviderRequest::from(job);
        let mut rendered: Option<Vec<u8>> = None;
        // Attempts from earlier deliveries count against the same budget.
        let mut attempt = record.attempt_count;

        if !self.retry.should_retry(attempt) {
            let error = match &lease.last_error {
                Some(last) => AttemptError {
                    class: last.class,
                    message: last.message.clone(),
                },
                None => AttemptError {
                    class: FailureClass::Internal,
                    message: format!("retry budget exhausted after {attempt} attempts"),
                },
            };
            return Ok(Outcome::Failed(error));
        }

        loop {
            attempt += 1;
            if !self.stores.queue.extend(lease, self.lease_for).await? {
                return Ok(Outcome::LeaseLost);
            }
            self.stores.generations.record_attempt(record.id).await?;

            let error = match self.attempt(&request, &mut rendered).await {
                Ok(video_url) => return Ok(Outcome::Stored(video_url)),
                Err(error) => error,
            };

            self.events.publish(
                GenerationEvent::new(GENERATION_ATTEMPT_FAILED)
                    .for_generation(record.id)
                    .with_user(record.user_id)
                    .with_payload(json!({
                        "attempt": attempt,
                        "error_class": error.class,
                        "error_message": error.message,
                    })),
            );
            if !self
                .stores
                .queue
                .record_error(lease, error.class, &error.message)
                .await?
            {
                return Ok(Outcome::LeaseLost);
            }

            if !error.class.is_retryable() || !self.retry.should_retry(attempt) {
                return Ok(Outcome::Failed(error));
            }

            let delay = self.retry.delay_for(attempt);
            tracing::warn!(
                generation_id = record.id,
                attempt,
                delay_ms = log_millis(delay),
                error_class = error.class.as_str(),
                error = %error.message,
                "Generation attempt failed, retrying",
            );
            tokio::select! {
                _ = cancel.cancelled() => return Ok(Outcome::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// One attempt: render (unless a previous attempt already did) and upload,
    /// both before the same deadline.
    async fn attempt(
        &self,
        request: &ProviderRequest,
        rendered: &mut Option<Vec<u8>>,
    ) -> Result<String, AttemptError> {
        let deadline = tokio::time::Instant::now() + self.attempt_timeout;
        let limit = self.attempt_timeout.as_secs();

        let bytes = match rendered.take() {
            Some(bytes) => bytes,
            None => match tokio::time::timeout_at(deadline, self.render(request)).await {
                Ok(result) => result?,
                Err(_) => {
                    return Err(AttemptError {
                        class: FailureClass::Timeout,
                        message: format!("provider did not finish within {limit}s"),
                    })
                }
            },
        };

        let key = video_key(request.generation_id);
        let upload = self
            .artifacts
            .upload(&key, bytes.clone(), VIDEO_CONTENT_TYPE);
        let message = match tokio::time::timeout_at(deadline, upload).await {
            Ok(Ok(url)) => return Ok(url),
            Ok(Err(e)) => format!("upload to {} failed: {e}", self.artifacts.name()),
            Err(_) => format!(
                "upload to {} did not finish within {limit}s",
                self.artifacts.name()
            ),
        };
        *rendered = Some(bytes);
        Err(AttemptError {
            class: FailureClass::Storage,
            message,
        })
    }

    async fn render(&self, request: &ProviderRequest) -> Result<Vec<u8>, AttemptError> {
        let classify = |e: ProviderError| AttemptError {
            class: e.failure_class(),
            message: e.to_string(),
        };
        let output = self.provider.generate(request).await.map_err(classify)?;
        tracing::debug!(
            generation_id = request.generation_id,
            provider = self.provider.name(),
            provider_video_id = %output.provider_video_id,
            "Provider returned video",
        );
        match output.video {
            VideoPayload::Bytes(bytes) => Ok(bytes),
            VideoPayload::Locator(locator) => {
                self.provider.download(&locator).await.map_err(classify)
            }
        }
    }

    fn publish_failed(
        &self,
        generation_id: DbId,
        user_id: Option<UserId>,
        class: FailureClass,
        message: &str,
    ) {
        let mut event = GenerationEvent::new(GENERATION_FAILED)
            .for_generation(generation_id)
            .with_payload(json!({ "error_class": class, "error_message": message }));
        if let Some(user_id) = user_id {
            event = event.with_user(user_id);
        }
        self.events.publish(event);
    }
}
