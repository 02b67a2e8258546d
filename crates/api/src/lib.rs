//! HTTP surface for submitting generations, polling them, and the pricing,
//! prompt and budget helpers around them.

pub mod config;
pub mod error;
pub mod handlers;
pub mod query;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
