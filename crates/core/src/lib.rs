pub mod budget;
pub mod context;
pub mod error;
pub mod generation;
pub mod job;
pub mod money;
pub mod pricing;
pub mod prompt;
pub mod provider;
pub mod record;
pub mod retry;
pub mod status;
pub mod storage;
pub mod templates;
pub mod types;
