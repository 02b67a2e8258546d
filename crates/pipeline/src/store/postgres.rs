//! Postgres-backed stores, thin adapters over the `veostudio_db` repositories.

use std::time::Duration;

use async_trait::async_trait;
use veostudio_core::budget::{BudgetAccount, Reservation};
use veostudio_core::generation::FailureClass;
use veostudio_core::job::GenerationJobPayload;
use veostudio_core::money::Money;
use veostudio_core::record::{GenerationRecord, NewGeneration};
use veostudio_core::templates::{NewSavedTemplate, SavedTemplate};
use veostudio_core::types::{DbId, Timestamp, UserId};
use veostudio_db::models::generation::Generation;
use veostudio_db::models::job::GenerationJob;
use veostudio_db::repositories::{
    BudgetRepo, ContextSnapshotRepo, GenerationJobRepo, GenerationRepo, PromptTemplateRepo,
};
use veostudio_db::DbPool;

use super::{CachedContext, ContextCache, ContextKey, GenerationStore, Page, TemplateStore};
use crate::error::StoreError;
use crate::ledger::{BudgetLedger, LedgerDefaults};
use crate::queue::{encode, JobQueue, Lease, RecordedError};

fn to_record(row: Generation) -> Result<GenerationRecord, StoreError> {
    GenerationRecord::try_from(row).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn to_records(rows: Vec<Generation>) -> Result<Vec<GenerationRecord>, StoreError> {
    rows.into_iter().map(to_record).collect()
}

// ---------------------------------------------------------------------------
// Generations
// ---------------------------------------------------------------------------

pub struct PgGenerationStore {
    pool: DbPool,
}

impl PgGenerationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GenerationStore for PgGenerationStore {
    async fn create_or_get(
        &self,
        new: NewGeneration,
    ) -> Result<(GenerationRecord, bool), StoreError> {
        let (row, created) = GenerationRepo::create_or_get(&self.pool, &new).await?;
        Ok((to_record(row)?, created))
    }

    async fn find_by_id(&self, id: DbId) -> Result<Option<GenerationRecord>, StoreError> {
        GenerationRepo::find_by_id(&self.pool, id)
            .await?
            .map(to_record)
            .transpose()
    }

    async fn find_by_request_id(
        &self,
        request_id: &str,
    ) -> Result<Option<GenerationRecord>, StoreError> {
        GenerationRepo::find_by_request_id(&self.pool, request_id)
            .await?
            .map(to_record)
            .transpose()
    }

    async fn list_by_user(
        &self,
        user_id: UserId,
        page: Page,
    ) -> Result<Vec<GenerationRecord>, StoreError> {
        let (limit, offset) = page.bounds();
        to_records(GenerationRepo::list_by_user(&self.pool, user_id, Some(limit), Some(offset)).await?)
    }

    async fn recent_for_context(
        &self,
        user_id: UserId,
        project_id: Option<DbId>,
        limit: usize,
    ) -> Result<Vec<GenerationRecord>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        to_records(GenerationRepo::recent_for_context(&self.pool, user_id, project_id, limit).await?)
    }

    async fn mark_processing(&self, id: DbId) -> Result<bool, StoreError> {
        Ok(GenerationRepo::mark_processing(&self.pool, id).await?)
    }

    async fn record_attempt(&self, id: DbId) -> Result<bool, StoreError> {
        Ok(GenerationRepo::record_attempt(&self.pool, id).await?)
    }

    async fn complete(
        &self,
        id: DbId,
        video_url: &str,
        actual_cost: Money,
    ) -> Result<bool, StoreError> {
        Ok(GenerationRepo::complete(&self.pool, id, video_url, actual_cost).await?)
    }

    async fn fail(&self, id: DbId, class: FailureClass, message: &str) -> Result<bool, StoreError> {
        Ok(GenerationRepo::fail(&self.pool, id, class, message).await?)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(veostudio_db::health_check(&self.pool).await?)
    }
}

// ---------------------------------------------------------------------------
// Budget ledger
// ---------------------------------------------------------------------------

pub struct PgLedger {
    pool: DbPool,
    defaults: LedgerDefaults,
}

impl PgLedger {
    pub fn new(pool: DbPool, defaults: LedgerDefaults) -> Self {
        Self { pool, defaults }
    }

    fn period_days(&self) -> i32 {
        i32::try_from(self.defaults.period_days).unwrap_or(i32::MAX)
    }

    /// Open the account if missing and roll an elapsed period.
    async fn prepare(&self, user_id: UserId) -> Result<(), StoreError> {
        BudgetRepo::ensure(&self.pool, user_id, self.defaults.limit, self.period_days()).await?;
        if BudgetRepo::roll_period(&self.pool, user_id).await? {
            tracing::info!(user_id, "Budget period reset");
        }
        Ok(())
    }

    async fn load(&self, user_id: UserId) -> Result<BudgetAccount, StoreError> {
        BudgetRepo::find(&self.pool, user_id)
            .await?
            .map(BudgetAccount::from)
            .ok_or_else(|| StoreError::Corrupt(format!("budget account {user_id} vanished")))
    }
}

#[async_trait]
impl BudgetLedger for PgLedger {
    async fn reserve(&self, user_id: UserId, amount: Money) -> Result<Reservation, StoreError> {
        self.prepare(user_id).await?;
        match BudgetRepo::reserve(&self.pool, user_id, amount).await? {
            Some(row) => Ok(Reservation::Admitted {
                remaining: BudgetAccount::from(row).remaining(),
            }),
            None => {
                let remaining = self.load(user_id).await?.remaining();
                Ok(Reservation::Rejected {
                    shortfall: amount.saturating_sub(remaining),
                    remaining,
                })
            }
        }
    }

    async fn release(&self, user_id: UserId, amount: Money) -> Result<(), StoreError> {
        Ok(BudgetRepo::release(&self.pool, user_id, amount).await?)
    }

    async fn account(&self, user_id: UserId) -> Result<BudgetAccount, StoreError> {
        self.prepare(user_id).await?;
        self.load(user_id).await
    }

    async fn set_limit(&self, user_id: UserId, limit: Money) -> Result<BudgetAccount, StoreError> {
        self.prepare(user_id).await?;
        let row = BudgetRepo::set_limit(&self.pool, user_id, limit, self.period_days()).await?;
        Ok(row.into())
    }
}

// ---------------------------------------------------------------------------
// Job queue
// ---------------------------------------------------------------------------

pub struct PgJobQueue {
    pool: DbPool,
}

impl PgJobQueue {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn to_lease(job: GenerationJob, worker: &str) -> Lease {
    let last_error = job
        .last_error_class
        .as_deref()
        .and_then(FailureClass::parse)
        .zip(job.last_error)
        .map(|(class, message)| RecordedError { class, message });
    Lease {
        job_id: job.id,
        generation_id: job.generation_id,
        worker: worker.to_string(),
        payload: job.payload,
        delivery: u32::try_from(job.lease_count).unwrap_or(0),
        last_error,
    }
}

/// The fencing token as stored in `lease_count`.
fn delivery(lease: &Lease) -> i32 {
    i32::try_from(lease.delivery).unwrap_or(i32::MAX)
}

#[async_trait]
impl JobQueue for PgJobQueue {
    async fn enqueue(&self, payload: &GenerationJobPayload) -> Result<DbId, StoreError> {
        let body = encode(payload)?;
        let job = GenerationJobRepo::enqueue(&self.pool, payload.generation_id(), &body)
            .await
            .map_err(|e| StoreError::from_sqlx(e, "queue entry for this generation"))?;
        Ok(job.id)
    }

    async fn lease(&self, worker: &str, lease_for: Duration) -> Result<Option<Lease>, StoreError> {
        let job = GenerationJobRepo::lease(&self.pool, worker, lease_for.as_secs_f64()).await?;
        Ok(job.map(|job| to_lease(job, worker)))
    }

    async fn extend(&self, lease: &Lease, lease_for: Duration) -> Result<bool, StoreError> {
        Ok(GenerationJobRepo::extend(
            &self.pool,
            lease.job_id,
            &lease.worker,
            delivery(lease),
            lease_for.as_secs_f64(),
        )
        .await?)
    }

    async fn record_error(
        &self,
        lease: &Lease,
        class: FailureClass,
        message: &str,
    ) -> Result<bool, StoreError> {
        Ok(GenerationJobRepo::record_error(
            &self.pool,
            lease.job_id,
            &lease.worker,
            delivery(lease),
            class.as_str(),
            message,
        )
        .await?)
    }

    async fn ack(&self, lease: &Lease) -> Result<bool, StoreError> {
        Ok(GenerationJobRepo::ack(&self.pool, lease.job_id, &lease.worker, delivery(lease)).await?)
    }

    async fn dead_letter(&self, lease: &Lease, reason: &str) -> Result<bool, StoreError> {
        Ok(GenerationJobRepo::dead_letter(
            &self.pool,
            lease.job_id,
            &lease.worker,
            delivery(lease),
            reason,
        )
        .await?)
    }

    async fn depth(&self) -> Result<u64, StoreError> {
        let depth = GenerationJobRepo::depth(&self.pool).await?;
        Ok(u64::try_from(depth).unwrap_or(0))
    }
}

// ---------------------------------------------------------------------------
// Context cache
// ---------------------------------------------------------------------------

pub struct PgContextCache {
    pool: DbPool,
}

impl PgContextCache {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContextCache for PgContextCache {
    async fn get(&self, key: &ContextKey) -> Result<Option<CachedContext>, StoreError> {
        let snapshot =
            ContextSnapshotRepo::find(&self.pool, key.user_id, key.task.as_str(), key.project_id)
                .await?;
        Ok(snapshot.map(|s| CachedContext {
            content: s.content,
            refreshed_at: s.refreshed_at,
        }))
    }

    async fn put(
        &self,
        key: &ContextKey,
        content: &str,
        refreshed_at: Timestamp,
    ) -> Result<(), StoreError> {
        ContextSnapshotRepo::upsert(
            &self.pool,
            key.user_id,
            key.task.as_str(),
            key.project_id,
            content,
            refreshed_at,
        )
        .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Saved templates
// ---------------------------------------------------------------------------

pub struct PgTemplateStore {
    pool: DbPool,
}

impl PgTemplateStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TemplateStore for PgTemplateStore {
    async fn create(&self, new: &NewSavedTemplate) -> Result<SavedTemplate, StoreError> {
        let row = PromptTemplateRepo::create(&self.pool, new)
            .await
            .map_err(|e| StoreError::from_sqlx(e, &format!("template '{}'", new.slug())))?;
        Ok(row.into())
    }

    async fn find_by_id(&self, id: DbId) -> Result<Option<SavedTemplate>, StoreError> {
        let row = PromptTemplateRepo::find_by_id(&self.pool, id).await?;
        Ok(row.map(SavedTemplate::from))
    }

    async fn record_use(&self, id: DbId) -> Result<Option<SavedTemplate>, StoreError> {
        let row = PromptTemplateRepo::record_use(&self.pool, id).await?;
        Ok(row.map(SavedTemplate::from))
    }

    async fn list(
        &self,
        product_type: Option<&str>,
        page: Page,
    ) -> Result<Vec<SavedTemplate>, StoreError> {
        let (limit, offset) = page.bounds();
        let rows = PromptTemplateRepo::list(&self.pool, product_type, limit, offset).await?;
        Ok(rows.into_iter().map(SavedTemplate::from).collect())
    }
}
