//! Repository implementations for PostgreSQL.

mod pipeline_store;

pub use pipeline_store::PgPipelineStore;
