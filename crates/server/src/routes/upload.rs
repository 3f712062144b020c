use axum::extract::{Multipart, State};
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::jobs::models::TaskType;
use crate::state::AppState;

#[derive(Serialize)]
pub struct UploadResponse {
    pub task_id: Uuid,
    pub message: String,
}

/// `POST /api/upload` — accept a multipart PDF upload, create a `pending`
/// task, persist the input to shared storage, and enqueue it onto the
/// broker stand-in.
pub async fn upload_pdf(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut pdf_data: Option<(String, Vec<u8>)> = None;

    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or("").to_string();
        if name == "file" {
            let filename = field.file_name().unwrap_or("upload.pdf").to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("InputError: failed to read file: {e}")))?;
            pdf_data = Some((filename, data.to_vec()));
        }
    }

    let (filename, data) =
        pdf_data.ok_or_else(|| ApiError::BadRequest("InputError: no PDF file provided".to_string()))?;

    // The task id isn't known until the store assigns one, so the row is
    // created first with a placeholder path and corrected once the real
    // input location (keyed by that id) exists.
    let task_id = state.store.create(TaskType::Pdf, String::new()).await;

    let relative_path = format!("inputs/{task_id}/{filename}");
    state.storage.write_bytes(&relative_path, &data).await?;
    let input_path = state.settings.storage_dir.join(&relative_path);
    state
        .store
        .set_input_path(&task_id, input_path.to_string_lossy().to_string())
        .await;

    state
        .task_sender
        .send(task_id)
        .map_err(|_| ApiError::Internal("StateError: dispatcher channel closed".to_string()))?;

    Ok(Json(UploadResponse {
        task_id,
        message: format!("task created for '{filename}'"),
    }))
}
