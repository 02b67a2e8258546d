//! Per-user budget accounts and reservation arithmetic.
//!
//! Storage backends hold the account; this module decides what a reservation
//! or a period rollover does to it.

use chrono::Duration;
use serde::Serialize;

use crate::money::Money;
use crate::types::{Timestamp, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BudgetAccount {
    pub user_id: UserId,
    pub limit: Money,
    pub used: Money,
    pub period_days: u32,
    /// When `used` next returns to zero.
    pub reset_at: Timestamp,
}

/// Outcome of an atomic check-and-reserve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Reservation {
    Admitted { remaining: Money },
    Rejected { shortfall: Money, remaining: Money },
}

impl Reservation {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted { .. })
    }
}

impl BudgetAccount {
    /// A new account with nothing spent and a period starting at `now`.
    pub fn open(user_id: UserId, limit: Money, period_days: u32, now: Timestamp) -> Self {
        Self {
            user_id,
            limit,
            used: Money::ZERO,
            period_days: period_days.max(1),
            reset_at: now + Duration::days(i64::from(period_days.max(1))),
        }
    }

    pub fn remaining(&self) -> Money {
        self.limit.saturating_sub(self.used)
    }

    /// Zero `used` and advance `reset_at` past `now` by whole periods.
    ///
    /// Idempotent: calling it again with the same `now` changes nothing.
    /// Returns `true` if a reset happened.
    pub fn roll_period(&mut self, now: Timestamp) -> bool {
        if now < self.reset_at {
            return false;
        }
        let period = Duration::days(i64::from(self.period_days.max(1)));
        let elapsed = (now - self.reset_at).num_seconds() / period.num_seconds();
        self.reset_at += period * (elapsed as i32 + 1);
        self.used = Money::ZERO;
        true
    }

    /// Check and increment in one step. Leaves the account untouched on
    /// rejection.
    pub fn reserve(&mut self, amount: Money) -> Reservation {
        let remaining = self.remaining();
        if amount > remaining {
            return Reservation::Rejected {
                shortfall: amount - remaining,
                remaining,
            };
        }
        self.used = self.used + amount;
        Reservation::Admitted {
            remaining: self.remaining(),
        }
    }

    /// Give back a reservation. Never drives `used` below zero.
    pub fn release(&mut self, amount: Money) {
        self.used = self.used.saturating_sub(amount);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    fn account(limit: i64, used: i64) -> BudgetAccount {
        let mut a = BudgetAccount::open(1, Money::from_cents(limit), 30, t0());
        a.used = Money::from_cents(used);
        a
    }

    #[test]
    fn rejection_reports_shortfall_and_leaves_usage() {
        let mut a = account(100, 60);
        let outcome = a.reserve(Money::from_cents(50));
        assert_eq!(
            outcome,
            Reservation::Rejected {
                shortfall: Money::from_cents(10),
                remaining: Money::from_cents(40),
            }
        );
        assert_eq!(a.used, Money::from_cents(60));
    }

    #[test]
    fn exact_fit_is_admitted() {
        let mut a = account(100, 50);
        assert_eq!(
            a.reserve(Money::from_cents(50)),
            Reservation::Admitted {
                remaining: Money::ZERO
            }
        );
        assert_eq!(a.used, Money::from_cents(100));
    }

    #[test]
    fn period_rolls_forward_in_whole_periods() {
        let mut a = account(100, 90);
        let now = t0() + Duration::days(75);
        assert!(a.roll_period(now));
        assert_eq!(a.used, Money::ZERO);
        assert_eq!(a.reset_at, t0() + Duration::days(90));
        assert!(!a.roll_period(now));
    }

    #[test]
    fn no_reset_before_due() {
        let mut a = account(100, 90);
        assert!(!a.roll_period(t0() + Duration::days(29)));
        assert_eq!(a.used, Money::from_cents(90));
    }

    #[test]
    fn release_floors_at_zero() {
        let mut a = account(100, 20);
        a.release(Money::from_cents(50));
        assert_eq!(a.used, Money::ZERO);
    }
}
