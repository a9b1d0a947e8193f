//! Request handlers organized by resource.

pub mod execute;
pub mod health;
pub mod pipelines;
pub mod stages;
