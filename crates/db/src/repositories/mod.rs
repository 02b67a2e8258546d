//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod budget_repo;
pub mod context_snapshot_repo;
pub mod event_repo;
pub mod generation_job_repo;
pub mod generation_repo;
pub mod prompt_template_repo;

pub use budget_repo::BudgetRepo;
pub use context_snapshot_repo::ContextSnapshotRepo;
pub use event_repo::EventRepo;
pub use generation_job_repo::GenerationJobRepo;
pub use generation_repo::GenerationRepo;
pub use prompt_template_repo::PromptTemplateRepo;
