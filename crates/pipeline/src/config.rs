use std::str::FromStr;
use std::time::Duration;

use veostudio_core::money::Money;
use veostudio_core::retry::RetryPolicy;

/// Pipeline tuning loaded from environment variables.
///
/// | Env var                  | Default  |
/// |--------------------------|----------|
/// | `WORKER_CONCURRENCY`     | `4`      |
/// | `MAX_ATTEMPTS`           | `3`      |
/// | `RETRY_BASE_DELAY_SECS`  | `2`      |
/// | `RETRY_JITTER_RATIO`     | `0.2`    |
/// | `ATTEMPT_TIMEOUT_SECS`   | `600`    |
/// | `QUEUE_POLL_INTERVAL_MS` | `1000`   |
/// | `CONTEXT_TTL_HOURS`      | `24`     |
/// | `DEFAULT_BUDGET_LIMIT`   | `10.00`  |
/// | `BUDGET_PERIOD_DAYS`     | `30`     |
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of concurrent worker tasks.
    pub worker_concurrency: usize,
    pub retry: RetryPolicy,
    /// Upper bound on one provider call plus download.
    pub attempt_timeout: Duration,
    /// How long an idle worker waits before polling the queue again.
    pub poll_interval: Duration,
    /// Age after which a cached context is rebuilt.
    pub context_ttl: chrono::Duration,
    /// Limit given to budget accounts created on first use.
    pub default_budget_limit: Money,
    pub budget_period_days: u32,
}

/// Extra lease time on top of the attempt timeout, covering upload and
/// bookkeeping after the provider returns.
const LEASE_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
#[error("{name} has an invalid value '{value}'")]
pub struct ConfigError {
    pub name: &'static str,
    pub value: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            worker_concurrency: 4,
            retry: RetryPolicy::default(),
            attempt_timeout: Duration::from_secs(600),
            poll_interval: Duration::from_millis(1000),
            context_ttl: chrono::Duration::hours(24),
            default_budget_limit: Money::from_cents(1000),
            budget_period_days: 30,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let worker_concurrency: usize = parse(&lookup, "WORKER_CONCURRENCY", 4)?;
        let max_attempts: u32 = parse(&lookup, "MAX_ATTEMPTS", 3)?;
        let base_delay_secs: u64 = parse(&lookup, "RETRY_BASE_DELAY_SECS", 2)?;
        let jitter_ratio: f64 = parse(&lookup, "RETRY_JITTER_RATIO", 0.2)?;
        let attempt_timeout_secs: u64 = parse(&lookup, "ATTEMPT_TIMEOUT_SECS", 600)?;
        let poll_interval_ms: u64 = parse(&lookup, "QUEUE_POLL_INTERVAL_MS", 1000)?;
        let context_ttl_hours: i64 = parse(&lookup, "CONTEXT_TTL_HOURS", 24)?;
        let default_limit: f64 = parse(&lookup, "DEFAULT_BUDGET_LIMIT", 10.0)?;
        let budget_period_days: u32 = parse(&lookup, "BUDGET_PERIOD_DAYS", 30)?;

        if worker_concurrency == 0 {
            return Err(invalid("WORKER_CONCURRENCY", worker_concurrency));
        }
        if max_attempts == 0 {
            return Err(invalid("MAX_ATTEMPTS", max_attempts));
        }
        if !(0.0..=1.0).contains(&jitter_ratio) {
            return Err(invalid("RETRY_JITTER_RATIO", jitter_ratio));
        }
        if default_limit < 0.0 {
            return Err(invalid("DEFAULT_BUDGET_LIMIT", default_limit));
        }
        if budget_period_days == 0 {
            return Err(invalid("BUDGET_PERIOD_DAYS", budget_period_days));
        }

        Ok(Self {
            worker_concurrency,
            retry: RetryPolicy {
                max_attempts,
                base_delay: Duration::from_secs(base_delay_secs),
                jitter_ratio,
            },
            attempt_timeout: Duration::from_secs(attempt_timeout_secs),
            poll_interval: Duration::from_millis(poll_interval_ms),
            context_ttl: chrono::Duration::hours(context_ttl_hours.max(0)),
            default_budget_limit: Money::from_dollars(default_limit),
            budget_period_days,
        })
    }

    /// Lease length for a queue entry; renewed before every attempt.
    pub fn lease_duration(&self) -> Duration {
        self.attempt_timeout + LEASE_MARGIN
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError { name, value }),
        None => Ok(default),
    }
}

fn invalid(name: &'static str, value: impl ToString) -> ConfigError {
    ConfigError {
        name,
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = PipelineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.worker_concurrency, 4);
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.attempt_timeout, Duration::from_secs(600));
        assert_eq!(config.context_ttl, chrono::Duration::hours(24));
        assert_eq!(config.default_budget_limit, Money::from_cents(1000));
        assert_eq!(config.lease_duration(), Duration::from_secs(660));
    }

    #[test]
    fn overrides_are_applied() {
        let config = PipelineConfig::from_lookup(lookup(&[
            ("WORKER_CONCURRENCY", "8"),
            ("MAX_ATTEMPTS", "5"),
            ("DEFAULT_BUDGET_LIMIT", "25.50"),
        ]))
        .unwrap();
        assert_eq!(config.worker_concurrency, 8);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.default_budget_limit, Money::from_cents(2550));
    }

    #[test]
    fn rejects_garbage() {
        let err = PipelineConfig::from_lookup(lookup(&[("MAX_ATTEMPTS", "lots")])).unwrap_err();
        assert_eq!(err.name, "MAX_ATTEMPTS");
        assert!(PipelineConfig::from_lookup(lookup(&[("WORKER_CONCURRENCY", "0")])).is_err());
        assert!(PipelineConfig::from_lookup(lookup(&[("RETRY_JITTER_RATIO", "1.5")])).is_err());
    }
}
