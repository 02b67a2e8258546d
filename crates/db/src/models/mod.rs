//! Row structs and insert DTOs.
//!
//! Each submodule contains a `FromRow` entity struct matching the database
//! row and, where rows are created from outside the repository, a create DTO.

pub mod budget;
pub mod context_snapshot;
pub mod event;
pub mod generation;
pub mod job;
pub mod prompt_template;
