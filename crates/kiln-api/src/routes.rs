//! API route definitions.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::handlers::{execute, health, pipelines, stages};
use crate::middleware::rate_limit;
use crate::state::AppState;

/// Create the main API router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let rate_limited = Router::new()
        .route("/execute", post(execute::execute))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .merge(rate_limited)
        .route("/pipelines/", get(pipelines::list_pipelines))
        .route("/pipelines/{id}", get(pipelines::get_pipeline_stages))
        .route("/stages", post(stages::bulk_stage_lookup))
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .with_state(state)
}
