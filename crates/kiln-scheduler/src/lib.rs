//! Pipeline scheduling and orchestration for Kiln.

pub mod dag;
pub mod scheduler;

pub use dag::{DagBuilder, DagError, PipelineDag};
pub use scheduler::{Outcome, Scheduler, DEFAULT_MAX_CONTAINERS};
