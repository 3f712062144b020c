use axum::extract::{Path, State};
use axum::http::header;
use axum::response::Response;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::jobs::models::TaskStatus;
use crate::state::AppState;

/// `GET /api/results/{id}/export` — stream the task's `result.zip`.
pub async fn export_zip(
    Path(task_id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
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

    let bytes = state
        .storage
        .read_bytes(&format!("outputs/{task_id}/{}", pdf.archive_file))
        .await?;

    let short_id = &task_id.to_string()[..8];
    let filename = format!("{short_id}_results.zip");

    Ok(Response::builder()
        .header(header::CONTENT_TYPE, "application/zip")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        )
        .body(axum::body::Body::from(bytes))
        .unwrap())
}
