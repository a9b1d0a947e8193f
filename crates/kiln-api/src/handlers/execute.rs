//! `POST /execute` handler: accepts a pipeline descriptor and hands it to
//! the scheduler in a background task so the request returns immediately.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use kiln_core::pipeline::PipelineDescriptor;
use std::sync::Arc;
use tracing::{error, info};

use crate::state::AppState;

pub async fn execute(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(descriptor): Json<PipelineDescriptor>,
) -> Result<StatusCode, (StatusCode, String)> {
    let client_id = client_id_header(&headers)?;

    let scheduler = Arc::clone(&state.scheduler);
    tokio::spawn(async move {
        match scheduler.schedule(descriptor, &client_id).await {
            Ok(outcome) => info!(client_id, ?outcome, "pipeline run finished"),
            Err(e) => error!(client_id, error = %e, "pipeline run errored"),
        }
    });

    Ok(StatusCode::ACCEPTED)
}

pub(crate) fn client_id_header(headers: &HeaderMap) -> Result<String, (StatusCode, String)> {
    headers
        .get("x-client-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or((StatusCode::BAD_REQUEST, "missing x-client-id header".to_string()))
}
