//! `POST /stages`: bulk stage status lookup across several pipeline ids.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use kiln_core::ids::PipelineId;
use kiln_core::state::StageRunRecord;
use std::collections::HashMap;
use std::sync::Arc;

use crate::handlers::execute::client_id_header;
use crate::state::AppState;

pub async fn bulk_stage_lookup(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(ids): Json<Vec<String>>,
) -> Result<Json<HashMap<String, Vec<StageRunRecord>>>, (StatusCode, String)> {
    let client_id = client_id_header(&headers)?;

    let mut result = HashMap::with_capacity(ids.len());
    for id in ids {
        let pipeline_id: PipelineId = id
            .parse()
            .map_err(|_| (StatusCode::BAD_REQUEST, format!("invalid pipeline id: {id}")))?;
        let stages = state
            .store
            .get_stages(pipeline_id, &client_id)
            .await
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
        result.insert(id, stages);
    }

    Ok(Json(result))
}
