//! Row model for the `budget_accounts` table.

use serde::Serialize;
use sqlx::FromRow;
use veostudio_core::budget::BudgetAccount;
use veostudio_core::money::Money;
use veostudio_core::types::{DbId, Timestamp};

/// A row from the `budget_accounts` table. Amounts are cents.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BudgetAccountRow {
    pub user_id: DbId,
    pub spend_limit: i64,
    pub used: i64,
    pub period_days: i32,
    pub reset_at: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<BudgetAccountRow> for BudgetAccount {
    fn from(row: BudgetAccountRow) -> Self {
        Self {
            user_id: row.user_id,
            limit: Money::from_cents(row.spend_limit),
            used: Money::from_cents(row.used),
            period_days: u32::try_from(row.period_days).unwrap_or(1),
            reset_at: row.reset_at,
        }
    }
}
