use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_loaded: bool,
    pub inference_engine: &'static str,
}

/// `GET /api/health`.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let model_loaded = state.inference_client.is_ready();
    Json(HealthResponse {
        status: if model_loaded { "healthy" } else { "starting" },
        model_loaded,
        inference_engine: "vllm_direct",
    })
}
