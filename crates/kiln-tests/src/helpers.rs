//! Test helper functions and utilities.

use async_trait::async_trait;
use kiln_api::routes::create_router;
use kiln_api::state::AppState;
use kiln_artifacts::FilesystemArtifactStore;
use kiln_core::rate_limit::RateLimiter;
use kiln_core::Result;
use kiln_db::{Database, PgPipelineStore};
use kiln_scheduler::Scheduler;
use reqwest::Client;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// A `ContainerRuntime` that never touches a real daemon. Enough to build an
/// `AppState` for exercising the read/health endpoints without Docker.
pub struct NullContainerRuntime;

#[async_trait]
impl kiln_core::ports::ContainerRuntime for NullContainerRuntime {
    async fn pull_image(&self, _reference: &str) -> Result<()> {
        Ok(())
    }

    async fn create_container(&self, _name: &str, _image_reference: &str, _command: &str) -> Result<String> {
        Ok("null-container".to_string())
    }

    async fn start_container(&self, _container_id: &str) -> Result<()> {
        Ok(())
    }

    async fn wait_container(&self, _container_id: &str) -> Result<i64> {
        Ok(0)
    }

    async fn read_logs(&self, _container_id: &str) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }

    async fn copy_between_containers(
        &self,
        _src_container: &str,
        _src_path: &str,
        _dst_container: &str,
        _dst_path: &str,
    ) -> Result<()> {
        Ok(())
    }

    async fn read_file(&self, _container_id: &str, _path: &str) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }

    async fn remove_container(&self, _container_id: &str) -> Result<()> {
        Ok(())
    }
}

/// Start an API server backed by a real (test-container) Postgres and a
/// filesystem artifact store, for exercising the HTTP surface end to end.
pub async fn start_test_server(
    db: Database,
    artifact_root: std::path::PathBuf,
) -> anyhow::Result<(SocketAddr, tokio::task::JoinHandle<()>)> {
    let store = Arc::new(PgPipelineStore::new(db.pool().clone()));
    let runtime = Arc::new(NullContainerRuntime);
    let artifacts = Arc::new(FilesystemArtifactStore::new(artifact_root));
    let scheduler = Arc::new(Scheduler::new(runtime, store.clone(), artifacts));
    let rate_limiter = Arc::new(RateLimiter::default_policy());

    let state = Arc::new(AppState::new(scheduler, store, rate_limiter));
    let router = create_router(state).into_make_service_with_connect_info::<SocketAddr>();

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    Ok((addr, handle))
}

/// Create an HTTP client for testing.
pub fn test_client() -> Client {
    Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .expect("failed to create test client")
}

/// API test client with a base URL and a fixed `x-client-id` header.
pub struct ApiTestClient {
    client: Client,
    base_url: String,
    client_id: String,
}

impl ApiTestClient {
    pub fn new(addr: SocketAddr, client_id: impl Into<String>) -> Self {
        Self {
            client: test_client(),
            base_url: format!("http://{}", addr),
            client_id: client_id.into(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get(&self, path: &str) -> reqwest::Result<reqwest::Response> {
        self.client
            .get(self.url(path))
            .header("x-client-id", &self.client_id)
            .send()
            .await
    }

    pub async fn post<T: serde::Serialize>(
        &self,
        path: &str,
        body: &T,
    ) -> reqwest::Result<reqwest::Response> {
        self.client
            .post(self.url(path))
            .header("x-client-id", &self.client_id)
            .json(body)
            .send()
            .await
    }

    /// Check the health endpoint (no client id required).
    pub async fn health(&self) -> anyhow::Result<bool> {
        let resp = self.client.get(self.url("/health")).send().await?;
        Ok(resp.status().is_success())
    }
}

/// Wait for a condition with timeout.
pub async fn wait_for<F, Fut>(
    timeout: std::time::Duration,
    interval: std::time::Duration,
    mut condition: F,
) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if condition().await {
            return true;
        }
        tokio::time::sleep(interval).await;
    }
    false
}

/// Assert that a future completes within a timeout.
pub async fn assert_completes_within<F, T>(future: F, timeout: std::time::Duration) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(timeout, future)
        .await
        .expect("operation timed out")
}
