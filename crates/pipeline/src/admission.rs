//! Admission: turn a submission into a budgeted, queued generation.
//!
//! The steps run in this order and stop at the first failure:
//!
//! 1. field validation
//! 2. idempotency lookup by `request_id`
//! 3. context retrieval
//! 4. prompt optimization
//! 5. cost estimate
//! 6. atomic budget reservation
//! 7. record creation (deduplicated on `request_id`)
//! 8. enqueue
//! 9. `generation.queued` event
//!
//! A reservation is released only when step 7 loses a race to a concurrent
//! submission with the same `request_id`, or fails outright. If step 8
//! fails, the record is marked `failed` with class `internal` and the
//! reservation is kept, matching the no-refund policy.

use std::sync::Arc;

use serde_json::json;
use veostudio_core::budget::{BudgetAccount, Reservation};
use veostudio_core::context::TaskType;
use veostudio_core::error::CoreError;
use veostudio_core::generation::{FailureClass, SubmitGenerationRequest, ValidatedSubmission};
use veostudio_core::job::{GenerationJobPayload, GenerationJobV1};
use veostudio_core::money::Money;
use veostudio_core::pricing::{Extras, PricingTable};
use veostudio_core::prompt;
use veostudio_core::record::{GenerationRecord, GenerationView, NewGeneration};
use veostudio_core::types::{DbId, UserId};
use veostudio_events::bus::{GENERATION_FAILED, GENERATION_QUEUED};
use veostudio_events::{EventBus, GenerationEvent};

use crate::config::PipelineConfig;
use crate::context::ContextStore;
use crate::store::{Page, Stores};

/// Result of a submission.
#[derive(Debug, Clone, PartialEq)]
pub struct Admission {
    pub view: GenerationView,
    /// `true` when the `request_id` matched an existing generation and
    /// nothing new was reserved, created or queued.
    pub deduplicated: bool,
}

/// Store reachability, reported by the health endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineHealth {
    pub store_ok: bool,
    pub queue_depth: Option<u64>,
}

pub struct AdmissionService {
    stores: Stores,
    context: ContextStore,
    pricing: PricingTable,
    events: Arc<EventBus>,
}

impl AdmissionService {
    pub fn new(
        stores: Stores,
        pricing: PricingTable,
        events: Arc<EventBus>,
        config: &PipelineConfig,
    ) -> Self {
        let context = ContextStore::new(
            Arc::clone(&stores.contexts),
            Arc::clone(&stores.generations),
            Arc::clone(&stores.clock),
            config.context_ttl,
        );
        Self {
            stores,
            context,
            pricing,
            events,
        }
    }

    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    pub fn context(&self) -> &ContextStore {
        &self.context
    }

    pub async fn submit(&self, request: SubmitGenerationRequest) -> Result<Admission, CoreError> {
        let submission = request.into_validated()?;
        let request_id = submission
            .request_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        if let Some(existing) = self.stores.generations.find_by_request_id(&request_id).await? {
            return deduplicated(existing, submission.user_id);
        }

        let context = self
            .context
            .get_context(submission.user_id, TaskType::VideoGeneration, submission.project_id)
            .await;
        let optimized = prompt::optimize(&submission.prompt, &context)?;
        let breakdown = self.pricing.estimate(
            submission.params.resolution,
            submission.params.duration,
            Extras {
                reference_images: submission.reference_images.len() as u32,
                audio: submission.include_audio,
            },
            1,
        );
        let cost = breakdown.total;

        match self.stores.ledger.reserve(submission.user_id, cost).await? {
            Reservation::Admitted { remaining } => {
                tracing::debug!(user_id = submission.user_id, cost = %cost, remaining = %remaining, "Budget reserved");
            }
            Reservation::Rejected {
                shortfall,
                remaining,
            } => {
                tracing::info!(
                    user_id = submission.user_id,
                    cost = %cost,
                    remaining = %remaining,
                    shortfall = %shortfall,
                    "Submission rejected: insufficient budget",
                );
                return Err(CoreError::InsufficientBudget { shortfall });
            }
        }

        let user_id = submission.user_id;
        let new = new_generation(submission, request_id, optimized.text, cost, optimized.optimized_tokens);
        let (record, created) = match self.stores.generations.create_or_get(new).await {
            Ok(result) => result,
            Err(e) => {
                self.release(user_id, cost).await;
                return Err(e.into());
            }
        };
        if !created {
            // A concurrent submission with the same request_id won.
            self.release(user_id, cost).await;
            return deduplicated(record, user_id);
        }

        let payload = GenerationJobPayload::v1(GenerationJobV1 {
            generation_id: record.id,
            prompt: record.prompt.clone(),
            negative_prompt: record.negative_prompt.clone(),
            params: record.params,
            reference_images: record.reference_images.clone(),
            include_audio: record.include_audio,
            context,
            estimated_cost: cost,
        });
        if let Err(e) = self.stores.queue.enqueue(&payload).await {
            return Err(self.abandon(&record, &e.to_string()).await);
        }

        tracing::info!(
            generation_id = record.id,
            user_id,
            request_id = %record.request_id,
            cost = %cost,
            tokens_saved = optimized.original_tokens.saturating_sub(optimized.optimized_tokens),
            "Generation queued",
        );
        self.events.publish(
            GenerationEvent::new(GENERATION_QUEUED)
                .for_generation(record.id)
                .with_user(user_id)
                .with_payload(json!({
                    "request_id": record.request_id,
                    "estimated_cost": cost,
                    "duration": record.params.duration.seconds(),
                    "resolution": record.params.resolution.as_str(),
                })),
        );

        Ok(Admission {
            view: record.view(),
            deduplicated: false,
        })
    }

    /// Polling view of one generation.
    pub async fn status(&self, id: DbId) -> Result<GenerationView, CoreError> {
        self.stores
            .generations
            .find_by_id(id)
            .await?
            .map(|r| r.view())
            .ok_or(CoreError::NotFound {
                entity: "generation",
                id,
            })
    }

    pub async fn list(&self, user_id: UserId, page: Page) -> Result<Vec<GenerationView>, CoreError> {
        let records = self.stores.generations.list_by_user(user_id, page).await?;
        Ok(records.iter().map(GenerationRecord::view).collect())
    }

    pub async fn budget(&self, user_id: UserId) -> Result<BudgetAccount, CoreError> {
        Ok(self.stores.ledger.account(user_id).await?)
    }

    pub async fn set_limit(&self, user_id: UserId, limit: Money) -> Result<BudgetAccount, CoreError> {
        if limit.is_negative() {
            return Err(CoreError::invalid("limit", "limit must not be negative"));
        }
        let account = self.stores.ledger.set_limit(user_id, limit).await?;
        tracing::info!(user_id, limit = %limit, "Budget limit updated");
        Ok(account)
    }

    pub async fn health(&self) -> PipelineHealth {
        let store_ok = match self.stores.generations.ping().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Generation store health check failed");
                false
            }
        };
        let queue_depth = self.stores.queue.depth().await.ok();
        PipelineHealth {
            store_ok,
            queue_depth,
        }
    }

    // ---- private helpers ----

    async fn release(&self, user_id: UserId, amount: Money) {
        if let Err(e) = self.stores.ledger.release(user_id, amount).await {
            tracing::error!(user_id, amount = %amount, error = %e, "Failed to release budget reservation");
        }
    }

    /// Mark a record that could not be queued as failed.
    async fn abandon(&self, record: &GenerationRecord, reason: &str) -> CoreError {
        let message = format!("failed to enqueue generation: {reason}");
        tracing::error!(generation_id = record.id, user_id = record.user_id, error = %reason, "Enqueue failed");
        match self
            .stores
            .generations
            .fail(record.id, FailureClass::Internal, &message)
            .await
        {
            Ok(true) => self.events.publish(
                GenerationEvent::new(GENERATION_FAILED)
                    .for_generation(record.id)
                    .with_user(record.user_id)
                    .with_payload(json!({
                        "error_class": FailureClass::Internal,
                        "error_message": message,
                    })),
            ),
            Ok(false) => {}
            Err(e) => {
                tracing::error!(generation_id = record.id, error = %e, "Failed to mark unqueued generation as failed");
            }
        }
        CoreError::Internal(message)
    }
}

fn deduplicated(existing: GenerationRecord, user_id: UserId) -> Result<Admission, CoreError> {
    if existing.user_id != user_id {
        return Err(CoreError::Conflict(format!(
            "request_id '{}' belongs to another user",
            existing.request_id
        )));
    }
    tracing::info!(generation_id = existing.id, request_id = %existing.request_id, "Duplicate submission");
    Ok(Admission {
        view: existing.view(),
        deduplicated: true,
    })
}

fn new_generation(
    submission: ValidatedSubmission,
    request_id: String,
    prompt: String,
    estimated_cost: Money,
    estimated_tokens: u32,
) -> NewGeneration {
    NewGeneration {
        user_id: submission.user_id,
        project_id: submission.project_id,
        request_id,
        prompt,
        negative_prompt: submission.negative_prompt,
        params: submission.params,
        reference_images: submission.reference_images,
        include_audio: submission.include_audio,
        estimated_cost,
        estimated_tokens,
    }
}
