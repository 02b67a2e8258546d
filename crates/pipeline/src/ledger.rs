//! Per-user budget ledger.
//!
//! The check against the limit and the increment of `used` happen in one
//! step: a guarded `UPDATE` in Postgres, a single lock in memory. Accounts
//! are opened lazily with the configured default limit, and an elapsed
//! period is rolled over before any read or reservation.
//!
//! Reservations are never refunded when a generation fails. [`release`]
//! exists only to give back a reservation whose record was never created.
//!
//! [`release`]: BudgetLedger::release

use async_trait::async_trait;
use veostudio_core::budget::{BudgetAccount, Reservation};
use veostudio_core::money::Money;
use veostudio_core::types::UserId;

use crate::error::StoreError;

/// Terms for accounts opened on first use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerDefaults {
    pub limit: Money,
    pub period_days: u32,
}

#[async_trait]
pub trait BudgetLedger: Send + Sync {
    /// Atomically admit `amount` against the user's remaining budget.
    async fn reserve(&self, user_id: UserId, amount: Money) -> Result<Reservation, StoreError>;

    /// Return a reservation. `used` never drops below zero.
    async fn release(&self, user_id: UserId, amount: Money) -> Result<(), StoreError>;

    async fn account(&self, user_id: UserId) -> Result<BudgetAccount, StoreError>;

    /// Change the limit, keeping current usage.
    async fn set_limit(&self, user_id: UserId, limit: Money) -> Result<BudgetAccount, StoreError>;
}
