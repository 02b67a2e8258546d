use std::time::Duration;

/// Veo client configuration loaded from environment variables.
///
/// | Env var                   | Default                                              |
/// |---------------------------|------------------------------------------------------|
/// | `GEMINI_API_KEY`          | **required**                                         |
/// | `VEO_MODEL`               | `veo-3.1-generate-preview`                           |
/// | `VEO_BASE_URL`            | `https://generativelanguage.googleapis.com/v1beta`   |
/// | `VEO_POLL_INTERVAL_SECS`  | `10`                                                 |
/// | `VEO_HTTP_TIMEOUT_SECS`   | `60`                                                 |
#[derive(Debug, Clone)]
pub struct VeoConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub poll_interval: Duration,
    /// Timeout for each individual HTTP request (not the whole generation).
    pub http_timeout: Duration,
}

pub const DEFAULT_MODEL: &str = "veo-3.1-generate-preview";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, thiserror::Error)]
pub enum VeoConfigError {
    #[error("GEMINI_API_KEY must be set")]
    MissingApiKey,

    #[error("{name} must be a valid integer, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },
}

impl VeoConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval: Duration::from_secs(10),
            http_timeout: Duration::from_secs(60),
        }
    }

    pub fn from_env() -> Result<Self, VeoConfigError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(VeoConfigError::MissingApiKey)?;

        let mut config = Self::new(api_key);
        if let Ok(model) = std::env::var("VEO_MODEL") {
            config.model = model;
        }
        if let Ok(base_url) = std::env::var("VEO_BASE_URL") {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        config.poll_interval = Duration::from_secs(env_secs("VEO_POLL_INTERVAL_SECS", 10)?);
        config.http_timeout = Duration::from_secs(env_secs("VEO_HTTP_TIMEOUT_SECS", 60)?);
        Ok(config)
    }
}

fn env_secs(name: &'static str, default: u64) -> Result<u64, VeoConfigError> {
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|_| VeoConfigError::InvalidNumber { name, value }),
        Err(_) => Ok(default),
    }
}
