use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ApiError;
use crate::state::AppState;
use jay_ocr_core::SizingOptions;

#[derive(Deserialize)]
pub struct InferRequest {
    pub prompt: String,
    pub image_base64: Option<String>,
    pub base_size: u32,
    pub image_size: u32,
    pub crop_mode: bool,
}

#[derive(Serialize)]
pub struct InferResponse {
    pub text: String,
}

/// `POST /internal/infer` — the worker-internal inference endpoint used
/// when this process itself is the model-serving side (the remote
/// inference backend of a sibling process POSTs here).
pub async fn infer(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<InferRequest>,
) -> Result<Json<InferResponse>, ApiError> {
    let token = headers
        .get("X-Internal-Token")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if token != state.settings.internal_api_token {
        return Err(ApiError::BadRequest("InputError: invalid internal token".to_string()));
    }

    let image = req
        .image_base64
        .as_deref()
        .map(decode_image)
        .transpose()
        .map_err(ApiError::BadRequest)?;

    let sizing = SizingOptions {
        base_size: req.base_size,
        image_size: req.image_size,
        crop_mode: req.crop_mode,
        test_compress: false,
    };

    let text = state
        .inference_client
        .submit(&req.prompt, image.as_ref(), sizing)
        .await?;

    Ok(Json(InferResponse { text }))
}

fn decode_image(b64: &str) -> Result<image::DynamicImage, String> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(b64)
        .map_err(|e| format!("InputError: invalid base64: {e}"))?;
    image::load_from_memory(&bytes).map_err(|e| format!("InputError: invalid image: {e}"))
}
