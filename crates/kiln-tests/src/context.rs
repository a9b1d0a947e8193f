//! Test context providing access to a throwaway Postgres instance.

use crate::containers::PostgresContainer;
use kiln_db::Database;

/// Test context with a migrated Postgres database running in a container.
///
/// Drop this to stop the container.
pub struct TestContext {
    pub postgres: PostgresContainer,
    pub db: Database,
}

impl TestContext {
    /// Start Postgres, connect, and apply migrations.
    pub async fn new() -> anyhow::Result<Self> {
        crate::init_test_logging();

        let postgres = PostgresContainer::start().await?;
        let db = Database::connect(postgres.connection_string()).await?;
        db.migrate().await?;

        Ok(Self { postgres, db })
    }

    /// Connection string of the running container.
    pub fn db_url(&self) -> &str {
        self.postgres.connection_string()
    }
}
