//! Testcontainer configuration for integration tests.

use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;

/// PostgreSQL container for persistence-adapter tests.
pub struct PostgresContainer {
    #[allow(dead_code)] // kept to maintain container lifetime
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

impl PostgresContainer {
    pub async fn start() -> anyhow::Result<Self> {
        let container = Postgres::default().with_tag("16-alpine").start().await?;

        let host = container.get_host().await?;
        let port = container.get_host_port_ipv4(5432).await?;

        let connection_string = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

        Ok(Self {
            container,
            connection_string,
        })
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }
}
