/// Database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// Users live in the external auth service; only their id is stored here.
pub type UserId = DbId;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
