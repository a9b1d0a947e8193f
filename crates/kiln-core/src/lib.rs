//! Kiln Core
//!
//! Core domain types, port traits, and error handling for the pipeline
//! scheduler. This crate has minimal dependencies and defines the shared
//! vocabulary used by the scheduler, the stage runner, and their adapters.
//! It never depends on a concrete container runtime, database driver, or
//! object-store client — only on the port traits in [`ports`].

pub mod error;
pub mod ids;
pub mod pipeline;
pub mod ports;
pub mod rate_limit;
pub mod sanitize;
pub mod state;

pub use error::{Error, Result};
pub use ids::PipelineId;
