//! Work queue between admission and the generation workers.
//!
//! Entries are delivered in enqueue order. A lease gives one worker
//! exclusive ownership until it acks, dead-letters or lets the lease
//! expire; an expired lease makes the entry claimable again, so delivery is
//! at-least-once and the worker must tolerate seeing a job twice.
//!
//! Every lease is fenced by its delivery number. A holder whose lease expired
//! and was re-issued can no longer extend, ack or dead-letter the entry, even
//! when the new holder runs under the same worker name.

use std::time::Duration;

use async_trait::async_trait;
use veostudio_core::generation::FailureClass;
use veostudio_core::job::GenerationJobPayload;
use veostudio_core::types::DbId;

use crate::error::StoreError;

/// A claimed queue entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Lease {
    pub job_id: DbId,
    pub generation_id: DbId,
    pub worker: String,
    /// Raw payload; decoding is the worker's job so that unreadable
    /// entries can be dead-lettered with a reason.
    pub payload: serde_json::Value,
    /// How many times this entry has been leased, including this one.
    /// Doubles as the fencing token for the lease.
    pub delivery: u32,
    /// The last attempt error recorded by an earlier delivery, if any.
    pub last_error: Option<RecordedError>,
}

/// A classified attempt failure kept on the queue entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedError {
    pub class: FailureClass,
    pub message: String,
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Append an entry. At most one unfinished entry may exist per
    /// generation; a second one is a [`StoreError::Conflict`].
    async fn enqueue(&self, payload: &GenerationJobPayload) -> Result<DbId, StoreError>;

    /// Claim the oldest ready (or lease-expired) entry.
    async fn lease(&self, worker: &str, lease_for: Duration) -> Result<Option<Lease>, StoreError>;

    /// Push the lease deadline out. `false` means the lease was lost.
    async fn extend(&self, lease: &Lease, lease_for: Duration) -> Result<bool, StoreError>;

    /// Remember why the latest attempt failed, so a later delivery that
    /// finds the retry budget spent can report it.
    async fn record_error(
        &self,
        lease: &Lease,
        class: FailureClass,
        message: &str,
    ) -> Result<bool, StoreError>;

    async fn ack(&self, lease: &Lease) -> Result<bool, StoreError>;

    /// Park the entry for inspection; it is never delivered again.
    async fn dead_letter(&self, lease: &Lease, reason: &str) -> Result<bool, StoreError>;

    /// Entries that are ready or leased.
    async fn depth(&self) -> Result<u64, StoreError>;
}

pub(crate) fn encode(payload: &GenerationJobPayload) -> Result<serde_json::Value, StoreError> {
    payload
        .to_json()
        .map_err(|e| StoreError::Corrupt(e.to_string()))
}
