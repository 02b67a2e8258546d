use veostudio_core::error::CoreError;

/// Failures from the pipeline's stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row or payload could not be mapped back to domain types.
    #[error("corrupt data: {0}")]
    Corrupt(String),

    #[error("{0}")]
    Conflict(String),
}

impl StoreError {
    /// Map a sqlx error, surfacing unique violations as [`StoreError::Conflict`].
    pub fn from_sqlx(error: sqlx::Error, what: &str) -> Self {
        let unique = error
            .as_database_error()
            .is_some_and(|db| db.is_unique_violation());
        if unique {
            Self::Conflict(format!("{what} already exists"))
        } else {
            Self::Database(error)
        }
    }
}

impl From<StoreError> for CoreError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Conflict(msg) => CoreError::Conflict(msg),
            other => CoreError::Internal(other.to_string()),
        }
    }
}
