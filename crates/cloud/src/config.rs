use std::path::PathBuf;

/// Storage configuration loaded from environment variables.
///
/// | Env var                  | Default                          |
/// |--------------------------|----------------------------------|
/// | `STORAGE_BACKEND`        | `local` (`local` or `s3`)        |
/// | `LOCAL_STORAGE_DIR`      | `./storage`                      |
/// | `LOCAL_PUBLIC_BASE_URL`  | `http://localhost:3000/media`    |
/// | `S3_BUCKET`              | required when backend is `s3`    |
/// | `S3_PUBLIC_BASE_URL`     | required when backend is `s3`    |
///
/// AWS credentials and region come from the standard AWS environment.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Local {
        root: PathBuf,
        public_base_url: String,
    },
    S3 {
        bucket: String,
        public_base_url: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum StorageConfigError {
    #[error("unknown STORAGE_BACKEND '{0}', expected 'local' or 's3'")]
    UnknownBackend(String),

    #[error("{0} must be set when STORAGE_BACKEND=s3")]
    Missing(&'static str),
}

impl StorageConfig {
    pub fn from_env() -> Result<Self, StorageConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup so parsing can be tested
    /// without touching the process environment.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, StorageConfigError> {
        let backend = lookup("STORAGE_BACKEND").unwrap_or_else(|| "local".into());
        let backend = match backend.trim().to_lowercase().as_str() {
            "local" => StorageBackend::Local {
                root: lookup("LOCAL_STORAGE_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("./storage")),
                public_base_url: lookup("LOCAL_PUBLIC_BASE_URL")
                    .unwrap_or_else(|| "http://localhost:3000/media".into()),
            },
            "s3" => StorageBackend::S3 {
                bucket: lookup("S3_BUCKET").ok_or(StorageConfigError::Missing("S3_BUCKET"))?,
                public_base_url: lookup("S3_PUBLIC_BASE_URL")
                    .ok_or(StorageConfigError::Missing("S3_PUBLIC_BASE_URL"))?,
            },
            other => return Err(StorageConfigError::UnknownBackend(other.to_string())),
        };
        Ok(Self { backend })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_to_local() {
        let config = StorageConfig::from_lookup(lookup(&[])).unwrap();
        assert_matches!(config.backend, StorageBackend::Local { .. });
    }

    #[test]
    fn s3_requires_bucket() {
        let err = StorageConfig::from_lookup(lookup(&[("STORAGE_BACKEND", "s3")])).unwrap_err();
        assert_matches!(err, StorageConfigError::Missing("S3_BUCKET"));
    }

    #[test]
    fn s3_backend_is_parsed() {
        let config = StorageConfig::from_lookup(lookup(&[
            ("STORAGE_BACKEND", "S3"),
            ("S3_BUCKET", "videos"),
            ("S3_PUBLIC_BASE_URL", "https://cdn.example.com"),
        ]))
        .unwrap();
        assert_eq!(
            config.backend,
            StorageBackend::S3 {
                bucket: "videos".into(),
                public_base_url: "https://cdn.example.com".into(),
            }
        );
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let err = StorageConfig::from_lookup(lookup(&[("STORAGE_BACKEND", "nfs")])).unwrap_err();
        assert_matches!(err, StorageConfigError::UnknownBackend(b) => assert_eq!(b, "nfs"));
    }
}
