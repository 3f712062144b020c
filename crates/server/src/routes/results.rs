use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::jobs::models::TaskStatus;
use crate::state::AppState;

#[derive(Serialize)]
pub struct ResultsResponse {
    pub task_id: Uuid,
    pub markdown: Option<String>,
    pub raw_json: Option<serde_json::Value>,
    pub total_pages: u32,
}

/// `GET /api/results/{id}` — markdown and metadata for a succeeded task.
pub async fn get_results(
    Path(task_id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<ResultsResponse>, ApiError> {
    let task = state
        .store
        .get(&task_id)
        .ok_or_else(|| ApiError::NotFound(format!("task {task_id} not found")))?;

    if task.status != TaskStatus::Succeeded {
        return Err(ApiError::BadRequest(format!(
            "task {task_id} is not succeeded (status: {:?})",
            task.status
        )));
    }

    if task.output_dir.is_none() {
        return Err(ApiError::Internal("StateError: succeeded task has no output_dir".to_string()));
    }
    let pdf = task
        .result_payload
        .pdf
        .ok_or_else(|| ApiError::Internal("StateError: succeeded task has no result payload".to_string()))?;

    let markdown = state
        .storage
        .read_bytes(&format!("outputs/{task_id}/{}", pdf.markdown_file))
        .await
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok());

    let raw_json: Option<serde_json::Value> = state
        .storage
        .read_bytes(&format!("outputs/{task_id}/{}", pdf.raw_json_file))
        .await
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok());

    Ok(Json(ResultsResponse {
        task_id,
        markdown,
        raw_json,
        total_pages: pdf.total_pages,
    }))
}
