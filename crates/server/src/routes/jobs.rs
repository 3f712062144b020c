use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::jobs::models::Task;
use crate::state::AppState;

#[derive(Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<Task>,
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub message: String,
}

/// `GET /api/jobs` — list all tasks, newest first.
pub async fn list_jobs(State(state): State<Arc<AppState>>) -> Json<JobListResponse> {
    Json(JobListResponse {
        jobs: state.store.list(),
    })
}

/// `GET /api/jobs/{id}` — task detail.
pub async fn get_job(
    Path(id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Task>, ApiError> {
    state
        .store
        .get(&id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("task {id} not found")))
}

/// `DELETE /api/jobs/{id}` — remove the task row and its on-disk artifacts.
/// Not part of the core state machine; an operator convenience the core
/// doesn't otherwise need.
pub async fn delete_job(
    Path(id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let task = state
        .store
        .get(&id)
        .ok_or_else(|| ApiError::NotFound(format!("task {id} not found")))?;

    if let Some(output_dir) = &task.output_dir {
        let _ = tokio::fs::remove_dir_all(output_dir).await;
    }
    let _ = tokio::fs::remove_file(&task.input_path).await;

    if state.store.delete(&id).await {
        Ok(Json(DeleteResponse {
            message: format!("task {id} deleted"),
        }))
    } else {
        Err(ApiError::NotFound(format!("task {id} not found")))
    }
}
