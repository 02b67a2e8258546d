//! Storage seams for the pipeline.
//!
//! Services hold `Arc<dyn Trait>` handles bundled in [`Stores`], built once
//! per process: [`Stores::postgres`] for the binaries, [`Stores::in_memory`]
//! for tests and local runs.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use veostudio_core::context::TaskType;
use veostudio_core::generation::FailureClass;
use veostudio_core::money::Money;
use veostudio_core::record::{GenerationRecord, NewGeneration};
use veostudio_core::templates::{NewSavedTemplate, SavedTemplate};
use veostudio_core::types::{DbId, Timestamp, UserId};
use veostudio_db::DbPool;

use crate::clock::{Clock, SystemClock};
use crate::error::StoreError;
use crate::ledger::{BudgetLedger, LedgerDefaults};
use crate::queue::JobQueue;

pub use memory::{
    InMemoryContextCache, InMemoryGenerationStore, InMemoryJobQueue, InMemoryLedger,
    InMemoryTemplateStore,
};
pub use postgres::{PgContextCache, PgGenerationStore, PgJobQueue, PgLedger, PgTemplateStore};

/// Pagination for listings. Limits are clamped to `1..=100`, default 20.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Page {
    pub(crate) fn bounds(self) -> (i64, i64) {
        use veostudio_db::repositories::generation_repo::{DEFAULT_LIMIT, MAX_LIMIT};
        (
            self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
            self.offset.unwrap_or(0).max(0),
        )
    }
}

/// Durable generation records.
///
/// Every transition method is guarded by the record's current status and
/// returns `false` when the guard rejected it, so a stale worker can never
/// move a record backward or out of a terminal state.
#[async_trait]
pub trait GenerationStore: Send + Sync {
    /// Insert a `queued` record, or return the one already holding the same
    /// `request_id`. The flag is `true` when this call created it.
    async fn create_or_get(
        &self,
        new: NewGeneration,
    ) -> Result<(GenerationRecord, bool), StoreError>;

    async fn find_by_id(&self, id: DbId) -> Result<Option<GenerationRecord>, StoreError>;

    async fn find_by_request_id(
        &self,
        request_id: &str,
    ) -> Result<Option<GenerationRecord>, StoreError>;

    /// Newest first.
    async fn list_by_user(
        &self,
        user_id: UserId,
        page: Page,
    ) -> Result<Vec<GenerationRecord>, StoreError>;

    /// Newest first, optionally scoped to one project.
    async fn recent_for_context(
        &self,
        user_id: UserId,
        project_id: Option<DbId>,
        limit: usize,
    ) -> Result<Vec<GenerationRecord>, StoreError>;

    /// `queued -> processing`, or a re-claim of a `processing` record.
    async fn mark_processing(&self, id: DbId) -> Result<bool, StoreError>;

    async fn record_attempt(&self, id: DbId) -> Result<bool, StoreError>;

    async fn complete(
        &self,
        id: DbId,
        video_url: &str,
        actual_cost: Money,
    ) -> Result<bool, StoreError>;

    async fn fail(&self, id: DbId, class: FailureClass, message: &str) -> Result<bool, StoreError>;

    /// Cheap reachability check for health endpoints.
    async fn ping(&self) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// Context cache
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextKey {
    pub user_id: UserId,
    pub task: TaskType,
    pub project_id: Option<DbId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedContext {
    pub content: String,
    pub refreshed_at: Timestamp,
}

/// Best-effort snapshot cache. Callers treat every error as a miss.
#[async_trait]
pub trait ContextCache: Send + Sync {
    async fn get(&self, key: &ContextKey) -> Result<Option<CachedContext>, StoreError>;

    async fn put(
        &self,
        key: &ContextKey,
        content: &str,
        refreshed_at: Timestamp,
    ) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// Saved prompt templates
// ---------------------------------------------------------------------------

#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Insert a normalized template. A taken slug is a [`StoreError::Conflict`].
    async fn create(&self, new: &NewSavedTemplate) -> Result<SavedTemplate, StoreError>;

    async fn find_by_id(&self, id: DbId) -> Result<Option<SavedTemplate>, StoreError>;

    /// Bump `usage_count` and return the template.
    async fn record_use(&self, id: DbId) -> Result<Option<SavedTemplate>, StoreError>;

    /// Newest first.
    async fn list(
        &self,
        product_type: Option<&str>,
        page: Page,
    ) -> Result<Vec<SavedTemplate>, StoreError>;
}

// ---------------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------------

/// All store handles one process needs, plus the clock they agree on.
#[derive(Clone)]
pub struct Stores {
    pub generations: Arc<dyn GenerationStore>,
    pub ledger: Arc<dyn BudgetLedger>,
    pub queue: Arc<dyn JobQueue>,
    pub contexts: Arc<dyn ContextCache>,
    pub templates: Arc<dyn TemplateStore>,
    pub clock: Arc<dyn Clock>,
}

impl Stores {
    pub fn in_memory(defaults: LedgerDefaults, clock: Arc<dyn Clock>) -> Self {
        Self {
            generations: Arc::new(InMemoryGenerationStore::new(Arc::clone(&clock))),
            ledger: Arc::new(InMemoryLedger::new(defaults, Arc::clone(&clock))),
            queue: Arc::new(InMemoryJobQueue::new(Arc::clone(&clock))),
            contexts: Arc::new(InMemoryContextCache::default()),
            templates: Arc::new(InMemoryTemplateStore::new(Arc::clone(&clock))),
            clock,
        }
    }

    pub fn postgres(pool: DbPool, defaults: LedgerDefaults) -> Self {
        Self {
            generations: Arc::new(PgGenerationStore::new(pool.clone())),
            ledger: Arc::new(PgLedger::new(pool.clone(), defaults)),
            queue: Arc::new(PgJobQueue::new(pool.clone())),
            contexts: Arc::new(PgContextCache::new(pool.clone())),
            templates: Arc::new(PgTemplateStore::new(pool)),
            clock: Arc::new(SystemClock),
        }
    }
}
