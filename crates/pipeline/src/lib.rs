//! Generation orchestration.
//!
//! Admission ([`admission::AdmissionService`]) turns a submission into a
//! budgeted, queued record. Workers ([`worker::GenerationWorker`], driven by
//! [`pool::WorkerPool`]) lease queue entries, call the video provider with
//! retries and store the artifact. Every piece of shared state sits behind a
//! trait in [`store`], [`ledger`] or [`queue`], with in-memory and Postgres
//! implementations. Saved prompt templates live in
//! [`library::TemplateLibrary`].

pub mod admission;
pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod ledger;
pub mod library;
pub mod pool;
pub mod queue;
pub mod store;
pub mod worker;

pub use admission::{Admission, AdmissionService};
pub use config::PipelineConfig;
pub use error::StoreError;
pub use library::TemplateLibrary;
pub use pool::WorkerPool;
pub use store::Stores;
pub use worker::GenerationWorker;
