//! Repository for the `budget_accounts` table.
//!
//! [`BudgetRepo::reserve`] is the only cross-request critical section in
//! admission: the limit check and the increment are one guarded `UPDATE`,
//! so concurrent reservations can never push `used` past `spend_limit`.

use sqlx::PgPool;
use veostudio_core::money::Money;
use veostudio_core::types::DbId;

use crate::models::budget::BudgetAccountRow;

/// Column list for `budget_accounts` queries.
const COLUMNS: &str = "user_id, spend_limit, used, period_days, reset_at, created_at, updated_at";

pub struct BudgetRepo;

impl BudgetRepo {
    pub async fn find(pool: &PgPool, user_id: DbId) -> Result<Option<BudgetAccountRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM budget_accounts WHERE user_id = $1");
        sqlx::query_as::<_, BudgetAccountRow>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Create the account with the default limit if it does not exist yet.
    pub async fn ensure(
        pool: &PgPool,
        user_id: DbId,
        default_limit: Money,
        period_days: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO budget_accounts (user_id, spend_limit, period_days, reset_at) \
             VALUES ($1, $2, $3, NOW() + make_interval(days => $3)) \
             ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(default_limit.cents())
        .bind(period_days)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Zero `used` and advance `reset_at` past now by whole periods, if due.
    ///
    /// Idempotent: a second call in the same period matches no row.
    pub async fn roll_period(pool: &PgPool, user_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE budget_accounts \
             SET used = 0, \
                 reset_at = reset_at + make_interval(days => (period_days * ( \
                     FLOOR(EXTRACT(EPOCH FROM (NOW() - reset_at)) / (period_days * 86400)) + 1 \
                 ))::INT), \
                 updated_at = NOW() \
             WHERE user_id = $1 AND reset_at <= NOW()",
        )
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Atomically add `amount` to `used` if it fits under the limit.
    ///
    /// Returns the updated row, or `None` when the reservation does not fit
    /// (or the account does not exist).
    pub async fn reserve(
        pool: &PgPool,
        user_id: DbId,
        amount: Money,
    ) -> Result<Option<BudgetAccountRow>, sqlx::Error> {
        let query = format!(
            "UPDATE budget_accounts \
             SET used = used + $2, updated_at = NOW() \
             WHERE user_id = $1 AND spend_limit - used >= $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, BudgetAccountRow>(&query)
            .bind(user_id)
            .bind(amount.cents())
            .fetch_optional(pool)
            .await
    }

    /// Return `amount` to the account, flooring `used` at zero.
    pub async fn release(pool: &PgPool, user_id: DbId, amount: Money) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE budget_accounts \
             SET used = GREATEST(used - $2, 0), updated_at = NOW() \
             WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(amount.cents())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Create or update the account's limit. Usage is preserved.
    pub async fn set_limit(
        pool: &PgPool,
        user_id: DbId,
        limit: Money,
        period_days: i32,
    ) -> Result<BudgetAccountRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO budget_accounts (user_id, spend_limit, period_days, reset_at) \
             VALUES ($1, $2, $3, NOW() + make_interval(days => $3)) \
             ON CONFLICT (user_id) DO UPDATE \
                SET spend_limit = EXCLUDED.spend_limit, updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, BudgetAccountRow>(&query)
            .bind(user_id)
            .bind(limit.cents())
            .bind(period_days)
            .fetch_one(pool)
            .await
    }
}
