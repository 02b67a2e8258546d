//! Generation lifecycle events.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`GenerationEvent`]: the event envelope published by admission and
//!   the workers.
//! - [`EventPersistence`]: background service that appends every event to
//!   the `generation_events` table.

pub mod bus;
pub mod persistence;

pub use bus::{EventBus, GenerationEvent};
pub use persistence::EventPersistence;
