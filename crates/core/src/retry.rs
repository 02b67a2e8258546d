//! Exponential-backoff retry policy for provider attempts.
//!
//! Attempt `n` (1-based) that fails transiently is followed by a delay of
//! `base * 2^(n-1)` plus up to `jitter_ratio` of that delay, so the default
//! policy waits roughly 2s, then 4s, then 8s.

use std::time::Duration;

use rand::Rng;

/// Upper bound on a single backoff delay regardless of attempt count.
pub const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Tunable parameters for the retry loop.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub base_delay: Duration,
    /// Fraction of the delay added as random jitter, `0.0..=1.0`.
    pub jitter_ratio: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            jitter_ratio: 0.2,
        }
    }
}

impl RetryPolicy {
    /// Whether another attempt is allowed after `attempt` attempts.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Deterministic part of the delay after failed attempt `attempt`.
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(MAX_BACKOFF)
    }

    /// Delay to sleep after failed attempt `attempt`, including jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay_for(attempt);
        let ratio = self.jitter_ratio.clamp(0.0, 1.0);
        if ratio == 0.0 {
            return base;
        }
        let max_jitter_ms = (base.as_millis() as f64 * ratio) as u64;
        if max_jitter_ms == 0 {
            return base;
        }
        let jitter_ms = rand::rng().random_range(0..=max_jitter_ms);
        base + Duration::from_millis(jitter_ms)
    }
}
