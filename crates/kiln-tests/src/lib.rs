//! Integration test infrastructure for the pipeline scheduler.
//!
//! This crate provides testcontainers-based infrastructure for running
//! integration tests against a real Postgres instance and the HTTP surface
//! built on top of it.
//!
//! ```ignore
//! use kiln_tests::TestContext;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let ctx = TestContext::new().await.unwrap();
//!     // Use ctx.db, ctx.db_url(), ...
//! }
//! ```

pub mod containers;
pub mod context;
pub mod fixtures;
pub mod helpers;

pub use context::TestContext;
pub use fixtures::*;
pub use helpers::*;

/// Initialize test logging (call once per test binary).
pub fn init_test_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,kiln_tests=debug")),
        )
        .with_test_writer()
        .try_init();
}
