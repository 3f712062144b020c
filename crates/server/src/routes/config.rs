use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

#[derive(Serialize)]
pub struct ConfigResponse {
    pub backend: &'static str,
    pub storage_backend: String,
    pub modes: Vec<&'static str>,
    pub pdf_max_concurrency: usize,
    pub base_size: u32,
    pub image_size: u32,
    pub crop_mode: bool,
}

/// `GET /api/config` — advertises the active configuration for a front-end
/// to populate a form.
pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<ConfigResponse> {
    let backend = if jay_ocr_core::config::uses_remote_inference(&state.settings) {
        "remote"
    } else {
        "local"
    };

    Json(ConfigResponse {
        backend,
        storage_backend: state.storage.backend_name().to_string(),
        modes: vec![
            "plain_ocr", "markdown", "tables_csv", "tables_md", "kv_json", "figure_chart",
            "find_ref", "layout_map", "pii_redact", "multilingual", "describe", "freeform",
        ],
        pdf_max_concurrency: state.settings.pdf_max_concurrency,
        base_size: state.settings.base_size,
        image_size: state.settings.image_size,
        crop_mode: state.settings.crop_mode,
    })
}
