//! Pipeline and stage read handlers.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use kiln_core::ids::PipelineId;
use kiln_core::state::StageRunRecord;
use serde::Serialize;
use std::sync::Arc;

use crate::handlers::execute::client_id_header;
use crate::state::AppState;

#[derive(Serialize)]
pub struct ListPipelinesResponse {
    pub pipeline_ids: Vec<String>,
}

pub async fn list_pipelines(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ListPipelinesResponse>, (StatusCode, String)> {
    let client_id = client_id_header(&headers)?;

    let ids = state
        .store
        .list_pipelines(&client_id)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(ListPipelinesResponse {
        pipeline_ids: ids.iter().map(|id| id.to_string()).collect(),
    }))
}

pub async fn get_pipeline_stages(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Vec<StageRunRecord>>, (StatusCode, String)> {
    let client_id = client_id_header(&headers)?;
    let pipeline_id: PipelineId = id
        .parse()
        .map_err(|_| (StatusCode::BAD_REQUEST, "invalid pipeline id".to_string()))?;

    let stages = state
        .store
        .get_stages(pipeline_id, &client_id)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(stages))
}
