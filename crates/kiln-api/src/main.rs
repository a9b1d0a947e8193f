//! Binary entry point: wires the core scheduler to its real adapters and
//! serves the HTTP surface.

use kiln_api::routes::create_router;
use kiln_api::state::AppState;
use kiln_artifacts::{EnvCredentialsProvider, S3ArtifactStore};
use kiln_core::rate_limit::RateLimiter;
use kiln_db::{Database, PgConfig, PgPipelineStore};
use kiln_runner::DockerRuntime;
use kiln_scheduler::Scheduler;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let pg_config = PgConfig::default();
    let database = Database::connect(&pg_config.connection_string()).await?;
    database.migrate().await?;
    let store = Arc::new(PgPipelineStore::new(database.pool().clone()));

    let runtime = Arc::new(DockerRuntime::connect()?);

    let bucket = std::env::var("ARTIFACT_BUCKET").unwrap_or_else(|_| "big-data-ci".to_string());
    let artifacts = Arc::new(S3ArtifactStore::new(&EnvCredentialsProvider, bucket).await?);

    let max_containers: usize = std::env::var("MAX_CONTAINERS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(kiln_scheduler::DEFAULT_MAX_CONTAINERS);

    let scheduler = Arc::new(Scheduler::with_max_containers(
        runtime,
        store.clone(),
        artifacts,
        max_containers,
    ));
    let rate_limiter = Arc::new(RateLimiter::default_policy());

    let state = Arc::new(AppState::new(scheduler, store, rate_limiter));
    let router = create_router(state).into_make_service_with_connect_info::<SocketAddr>();

    let addr: SocketAddr = std::env::var("BIND_ADDR")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or_else(|| "0.0.0.0:8080".parse().unwrap());

    tracing::info!(%addr, "kiln api listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
