//! In-memory stores.
//!
//! Each store keeps its state behind one `tokio::sync::Mutex`, which makes
//! every operation atomic with respect to the others on the same store. Time
//! comes from the injected [`Clock`] so tests can expire leases and cached
//! contexts without sleeping.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use veostudio_core::budget::{BudgetAccount, Reservation};
use veostudio_core::generation::FailureClass;
use veostudio_core::job::GenerationJobPayload;
use veostudio_core::money::Money;
use veostudio_core::record::{GenerationRecord, NewGeneration};
use veostudio_core::status::{GenerationStatus, QueueState};
use veostudio_core::templates::{NewSavedTemplate, SavedTemplate};
use veostudio_core::types::{DbId, Timestamp, UserId};

use super::{CachedContext, ContextCache, ContextKey, GenerationStore, Page, TemplateStore};
use crate::clock::Clock;
use crate::error::StoreError;
use crate::ledger::{BudgetLedger, LedgerDefaults};
use crate::queue::{encode, JobQueue, Lease, RecordedError};

// ---------------------------------------------------------------------------
// Generations
// ---------------------------------------------------------------------------

#[derive(Default)]
struct GenerationTable {
    next_id: DbId,
    records: BTreeMap<DbId, GenerationRecord>,
    by_request: HashMap<String, DbId>,
}

pub struct InMemoryGenerationStore {
    table: Mutex<GenerationTable>,
    clock: Arc<dyn Clock>,
}

impl InMemoryGenerationStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            table: Mutex::new(GenerationTable::default()),
            clock,
        }
    }

    /// Apply `change` if the record may move to `next`.
    async fn transition(
        &self,
        id: DbId,
        next: GenerationStatus,
        change: impl FnOnce(&mut GenerationRecord, Timestamp),
    ) -> bool {
        let mut table = self.table.lock().await;
        let Some(record) = table.records.get_mut(&id) else {
            return false;
        };
        if !record.status.can_transition_to(next) {
            return false;
        }
        record.status = next;
        change(record, self.clock.now());
        true
    }
}

#[async_trait]
impl GenerationStore for InMemoryGenerationStore {
    async fn create_or_get(
        &self,
        new: NewGeneration,
    ) -> Result<(GenerationRecord, bool), StoreError> {
        let mut table = self.table.lock().await;
        if let Some(existing) = table
            .by_request
            .get(&new.request_id)
            .and_then(|id| table.records.get(id))
        {
            return Ok((existing.clone(), false));
        }

        table.next_id += 1;
        let id = table.next_id;
        let record = GenerationRecord::queued(id, new, self.clock.now());
        table.by_request.insert(record.request_id.clone(), id);
        table.records.insert(id, record.clone());
        Ok((record, true))
    }

    async fn find_by_id(&self, id: DbId) -> Result<Option<GenerationRecord>, StoreError> {
        Ok(self.table.lock().await.records.get(&id).cloned())
    }

    async fn find_by_request_id(
        &self,
        request_id: &str,
    ) -> Result<Option<GenerationRecord>, StoreError> {
        let table = self.table.lock().await;
        Ok(table
            .by_request
            .get(request_id)
            .and_then(|id| table.records.get(id))
            .cloned())
    }

    async fn list_by_user(
        &self,
        user_id: UserId,
        page: Page,
    ) -> Result<Vec<GenerationRecord>, StoreError> {
        let (limit, offset) = page.bounds();
        let table = self.table.lock().await;
        Ok(table
            .records
            .values()
            .rev()
            .filter(|r| r.user_id == user_id)
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn recent_for_context(
        &self,
        user_id: UserId,
        project_id: Option<DbId>,
        limit: usize,
    ) -> Result<Vec<GenerationRecord>, StoreError> {
        let table = self.table.lock().await;
        Ok(table
            .records
            .values()
            .rev()
            .filter(|r| r.user_id == user_id)
            .filter(|r| project_id.is_none() || r.project_id == project_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_processing(&self, id: DbId) -> Result<bool, StoreError> {
        Ok(self
            .transition(id, GenerationStatus::Processing, |r, now| {
                r.started_at.get_or_insert(now);
            })
            .await)
    }

    async fn record_attempt(&self, id: DbId) -> Result<bool, StoreError> {
        let mut table = self.table.lock().await;
        match table.records.get_mut(&id) {
            Some(r) if r.status == GenerationStatus::Processing => {
                r.attempt_count += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn complete(
        &self,
        id: DbId,
        video_url: &str,
        actual_cost: Money,
    ) -> Result<bool, StoreError> {
        Ok(self
            .transition(id, GenerationStatus::Completed, |r, now| {
                r.video_url = Some(video_url.to_string());
                r.actual_cost = Some(actual_cost);
                r.completed_at = Some(now);
            })
            .await)
    }

    async fn fail(&self, id: DbId, class: FailureClass, message: &str) -> Result<bool, StoreError> {
        Ok(self
            .transition(id, GenerationStatus::Failed, |r, now| {
                r.error_class = Some(class);
                r.error_message = Some(message.to_string());
                r.completed_at = Some(now);
            })
            .await)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Budget ledger
// ---------------------------------------------------------------------------

pub struct InMemoryLedger {
    accounts: Mutex<HashMap<UserId, BudgetAccount>>,
    defaults: LedgerDefaults,
    clock: Arc<dyn Clock>,
}

impl InMemoryLedger {
    pub fn new(defaults: LedgerDefaults, clock: Arc<dyn Clock>) -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            defaults,
            clock,
        }
    }

    /// Run `f` on the user's account, opening it and rolling its period
    /// first. The lock is held for the whole call.
    async fn with_account<T>(&self, user_id: UserId, f: impl FnOnce(&mut BudgetAccount) -> T) -> T {
        let now = self.clock.now();
        let mut accounts = self.accounts.lock().await;
        let account = accounts.entry(user_id).or_insert_with(|| {
            BudgetAccount::open(user_id, self.defaults.limit, self.defaults.period_days, now)
        });
        if account.roll_period(now) {
            tracing::info!(user_id, reset_at = %account.reset_at, "Budget period reset");
        }
        f(account)
    }
}

#[async_trait]
impl BudgetLedger for InMemoryLedger {
    async fn reserve(&self, user_id: UserId, amount: Money) -> Result<Reservation, StoreError> {
        Ok(self.with_account(user_id, |a| a.reserve(amount)).await)
    }

    async fn release(&self, user_id: UserId, amount: Money) -> Result<(), StoreError> {
        self.with_account(user_id, |a| a.release(amount)).await;
        Ok(())
    }

    async fn account(&self, user_id: UserId) -> Result<BudgetAccount, StoreError> {
        Ok(self.with_account(user_id, |a| a.clone()).await)
    }

    async fn set_limit(&self, user_id: UserId, limit: Money) -> Result<BudgetAccount, StoreError> {
        Ok(self
            .with_account(user_id, |a| {
                a.limit = limit;
                a.clone()
            })
            .await)
    }
}

// ---------------------------------------------------------------------------
// Job queue
// ---------------------------------------------------------------------------

/// Finished entries kept for [`InMemoryJobQueue::state`] and
/// [`InMemoryJobQueue::last_error`]; older ones are dropped.
const FINISHED_RETAINED: usize = 1024;

struct QueueEntry {
    id: DbId,
    generation_id: DbId,
    payload: serde_json::Value,
    state: QueueState,
    leased_by: Option<String>,
    lease_expires_at: Option<Timestamp>,
    lease_count: u32,
    last_error: Option<RecordedError>,
}

impl QueueEntry {
    fn claimable(&self, now: Timestamp) -> bool {
        match self.state {
            QueueState::Ready => true,
            QueueState::Leased => self.lease_expires_at.is_some_and(|t| t < now),
            QueueState::Done | QueueState::Dead => false,
        }
    }

    /// The worker name alone is not enough: a re-issued lease under the same
    /// name carries a newer delivery number.
    fn held_by(&self, lease: &Lease) -> bool {
        self.state == QueueState::Leased
            && self.lease_count == lease.delivery
            && self.leased_by.as_deref() == Some(lease.worker.as_str())
    }
}

/// What survives of an entry once it is acked or dead-lettered.
struct FinishedEntry {
    state: QueueState,
    last_error: Option<String>,
}

#[derive(Default)]
struct QueueTable {
    next_id: DbId,
    /// Ready and leased entries, ordered by id (enqueue order).
    entries: Vec<QueueEntry>,
    /// Keyed by id, so the oldest is evicted first.
    finished: BTreeMap<DbId, FinishedEntry>,
}

impl QueueTable {
    fn retire(&mut self, index: usize, state: QueueState) {
        let entry = self.entries.remove(index);
        self.finished.insert(
            entry.id,
            FinishedEntry {
                state,
                last_error: entry.last_error.map(|e| e.message),
            },
        );
        while self.finished.len() > FINISHED_RETAINED {
            self.finished.pop_first();
        }
    }
}

pub struct InMemoryJobQueue {
    table: Mutex<QueueTable>,
    clock: Arc<dyn Clock>,
}

impl InMemoryJobQueue {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            table: Mutex::new(QueueTable::default()),
            clock,
        }
    }

    /// Last error recorded on an entry, for inspecting dead letters.
    pub async fn last_error(&self, job_id: DbId) -> Option<String> {
        let table = self.table.lock().await;
        match table.finished.get(&job_id) {
            Some(finished) => finished.last_error.clone(),
            None => table
                .entries
                .iter()
                .find(|e| e.id == job_id)
                .and_then(|e| e.last_error.as_ref().map(|e| e.message.clone())),
        }
    }

    /// Current state of an entry.
    pub async fn state(&self, job_id: DbId) -> Option<QueueState> {
        let table = self.table.lock().await;
        match table.finished.get(&job_id) {
            Some(finished) => Some(finished.state),
            None => table.entries.iter().find(|e| e.id == job_id).map(|e| e.state),
        }
    }

    async fn finish(&self, lease: &Lease, state: QueueState, error: Option<&str>) -> bool {
        let mut table = self.table.lock().await;
        let Some(index) = table.entries.iter().position(|e| e.id == lease.job_id) else {
            return false;
        };
        if !table.entries[index].held_by(lease) {
            return false;
        }
        if let Some(error) = error {
            table.entries[index].last_error = Some(RecordedError {
                class: FailureClass::Internal,
                message: error.to_string(),
            });
        }
        table.retire(index, state);
        true
    }
}

fn expiry(now: Timestamp, lease_for: Duration) -> Timestamp {
    now + chrono::Duration::from_std(lease_for).unwrap_or(chrono::Duration::days(365))
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, payload: &GenerationJobPayload) -> Result<DbId, StoreError> {
        let body = encode(payload)?;
        let generation_id = payload.generation_id();
        let mut table = self.table.lock().await;
        if table.entries.iter().any(|e| e.generation_id == generation_id) {
            return Err(StoreError::Conflict(format!(
                "generation {generation_id} is already queued"
            )));
        }

        table.next_id += 1;
        let id = table.next_id;
        table.entries.push(QueueEntry {
            id,
            generation_id,
            payload: body,
            state: QueueState::Ready,
            leased_by: None,
            lease_expires_at: None,
            lease_count: 0,
            last_error: None,
        });
        Ok(id)
    }

    async fn lease(&self, worker: &str, lease_for: Duration) -> Result<Option<Lease>, StoreError> {
        let now = self.clock.now();
        let mut table = self.table.lock().await;
        let Some(entry) = table.entries.iter_mut().find(|e| e.claimable(now)) else {
            return Ok(None);
        };
        entry.state = QueueState::Leased;
        entry.leased_by = Some(worker.to_string());
        entry.lease_expires_at = Some(expiry(now, lease_for));
        entry.lease_count += 1;
        Ok(Some(Lease {
            job_id: entry.id,
            generation_id: entry.generation_id,
            worker: worker.to_string(),
            payload: entry.payload.clone(),
            delivery: entry.lease_count,
            last_error: entry.last_error.clone(),
        }))
    }

    async fn extend(&self, lease: &Lease, lease_for: Duration) -> Result<bool, StoreError> {
        let now = self.clock.now();
        let mut table = self.table.lock().await;
        match table.entries.iter_mut().find(|e| e.id == lease.job_id) {
            Some(entry) if entry.held_by(lease) => {
                entry.lease_expires_at = Some(expiry(now, lease_for));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_error(
        &self,
        lease: &Lease,
        class: FailureClass,
        message: &str,
    ) -> Result<bool, StoreError> {
        let mut table = self.table.lock().await;
        match table.entries.iter_mut().find(|e| e.id == lease.job_id) {
            Some(entry) if entry.held_by(lease) => {
                entry.last_error = Some(RecordedError {
                    class,
                    message: message.to_string(),
                });
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn ack(&self, lease: &Lease) -> Result<bool, StoreError> {
        Ok(self.finish(lease, QueueState::Done, None).await)
    }

    async fn dead_letter(&self, lease: &Lease, reason: &str) -> Result<bool, StoreError> {
        Ok(self.finish(lease, QueueState::Dead, Some(reason)).await)
    }

    async fn depth(&self) -> Result<u64, StoreError> {
        let table = self.table.lock().await;
        Ok(table.entries.len() as u64)
    }
}

// ---------------------------------------------------------------------------
// Context cache
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryContextCache {
    entries: Mutex<HashMap<ContextKey, CachedContext>>,
}

#[async_trait]
impl ContextCache for InMemoryContextCache {
    async fn get(&self, key: &ContextKey) -> Result<Option<CachedContext>, StoreError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn put(
        &self,
        key: &ContextKey,
        content: &str,
        refreshed_at: Timestamp,
    ) -> Result<(), StoreError> {
        self.entries.lock().await.insert(
            *key,
            CachedContext {
                content: content.to_string(),
                refreshed_at,
            },
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Saved templates
// ---------------------------------------------------------------------------

pub struct InMemoryTemplateStore {
    /// Keyed by id, which is insertion order.
    templates: Mutex<BTreeMap<DbId, SavedTemplate>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryTemplateStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            templates: Mutex::new(BTreeMap::new()),
            clock,
        }
    }
}

#[async_trait]
impl TemplateStore for InMemoryTemplateStore {
    async fn create(&self, new: &NewSavedTemplate) -> Result<SavedTemplate, StoreError> {
        let slug = new.slug();
        let mut templates = self.templates.lock().await;
        if templates.values().any(|t| t.slug == slug) {
            return Err(StoreError::Conflict(format!("template '{slug}' already exists")));
        }
        let id = templates.keys().next_back().map_or(1, |last| last + 1);
        let template = SavedTemplate {
            id,
            slug,
            name: new.name.clone(),
            prompt: new.prompt.clone(),
            product_type: new.product_type.clone(),
            tags: new.tags.clone(),
            notes: new.notes.clone(),
            usage_count: 0,
            created_at: self.clock.now(),
        };
        templates.insert(id, template.clone());
        Ok(template)
    }

    async fn find_by_id(&self, id: DbId) -> Result<Option<SavedTemplate>, StoreError> {
        Ok(self.templates.lock().await.get(&id).cloned())
    }

    async fn record_use(&self, id: DbId) -> Result<Option<SavedTemplate>, StoreError> {
        let mut templates = self.templates.lock().await;
        Ok(templates.get_mut(&id).map(|t| {
            t.usage_count += 1;
            t.clone()
        }))
    }

    async fn list(
        &self,
        product_type: Option<&str>,
        page: Page,
    ) -> Result<Vec<SavedTemplate>, StoreError> {
        let (limit, offset) = page.bounds();
        let templates = self.templates.lock().await;
        Ok(templates
            .values()
            .rev()
            .filter(|t| product_type.map_or(true, |p| t.product_type == p))
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
