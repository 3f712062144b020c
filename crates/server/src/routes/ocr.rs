use axum::extract::{Multipart, State};
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use crate::error::ApiError;
use crate::state::AppState;
use jay_ocr_core::{grounding, prompt, OcrMode, PromptOptions, SizingOptions};

#[derive(Serialize)]
pub struct ImageDims {
    pub w: u32,
    pub h: u32,
}

#[derive(Serialize)]
pub struct OcrMetadata {
    pub mode: OcrMode,
    pub grounding: bool,
    pub base_size: u32,
    pub image_size: u32,
    pub crop_mode: bool,
    pub inference_engine: &'static str,
}

#[derive(Serialize)]
pub struct OcrResponse {
    pub success: bool,
    pub text: String,
    pub raw_text: String,
    pub boxes: Vec<grounding::BoundingBox>,
    pub image_dims: Option<ImageDims>,
    pub metadata: OcrMetadata,
}

#[derive(Default)]
struct OcrForm {
    mode: Option<OcrMode>,
    prompt: Option<String>,
    grounding: Option<bool>,
    include_caption: Option<bool>,
    find_term: Option<String>,
    schema: Option<String>,
    base_size: Option<u32>,
    image_size: Option<u32>,
    crop_mode: Option<bool>,
}

/// `POST /api/ocr` — synchronous single-image OCR. Shares the grounding
/// post-processor with the PDF path but has no task row: the caller waits
/// on the HTTP response directly.
pub async fn ocr_image(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<OcrResponse>, ApiError> {
    let mut image_bytes: Option<Vec<u8>> = None;
    let mut form = OcrForm::default();

    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "image" => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("InputError: failed to read image: {e}")))?;
                image_bytes = Some(data.to_vec());
            }
            "mode" => form.mode = field.text().await.ok().and_then(|t| parse_mode(&t)),
            "prompt" => form.prompt = field.text().await.ok(),
            "grounding" => form.grounding = field.text().await.ok().and_then(|t| t.parse().ok()),
            "include_caption" => {
                form.include_caption = field.text().await.ok().and_then(|t| t.parse().ok())
            }
            "find_term" => form.find_term = field.text().await.ok(),
            "schema" => form.schema = field.text().await.ok(),
            "base_size" => form.base_size = field.text().await.ok().and_then(|t| t.parse().ok()),
            "image_size" => form.image_size = field.text().await.ok().and_then(|t| t.parse().ok()),
            "crop_mode" => form.crop_mode = field.text().await.ok().and_then(|t| t.parse().ok()),
            _ => {}
        }
    }

    let bytes = image_bytes.ok_or_else(|| ApiError::BadRequest("InputError: no image provided".to_string()))?;
    let image = image::load_from_memory(&bytes)
        .map_err(|e| ApiError::BadRequest(format!("InputError: invalid image: {e}")))?;
    let (width, height) = (image.width(), image.height());

    let mode = form.mode.unwrap_or(OcrMode::PlainOcr);
    let opts = PromptOptions {
        grounding: form.grounding,
        include_caption: form.include_caption.unwrap_or(false),
        find_term: form.find_term,
        schema: form.schema,
        prompt: form.prompt,
    };
    let grounding_on = prompt::grounding_enabled(mode, opts.grounding.unwrap_or(false));
    let built_prompt = prompt::build(mode, &opts);

    let sizing = SizingOptions {
        base_size: form.base_size.unwrap_or(state.settings.base_size),
        image_size: form.image_size.unwrap_or(state.settings.image_size),
        crop_mode: form.crop_mode.unwrap_or(state.settings.crop_mode),
        test_compress: false,
    };

    let raw_text = state
        .inference_client
        .submit(&built_prompt, Some(&image), sizing)
        .await?;

    let boxes = if grounding_on {
        grounding::parse(&raw_text, width, height)
    } else {
        Vec::new()
    };
    let text = if grounding::detect(&raw_text) {
        let images_dir = state.settings.storage_dir.join("images").join("sync");
        grounding::rewrite(&raw_text, &image, 0, &images_dir)?.markdown
    } else {
        raw_text.clone()
    };

    Ok(Json(OcrResponse {
        success: true,
        text,
        raw_text,
        boxes,
        image_dims: Some(ImageDims { w: width, h: height }),
        metadata: OcrMetadata {
            mode,
            grounding: grounding_on,
            base_size: sizing.base_size,
            image_size: sizing.image_size,
            crop_mode: sizing.crop_mode,
            inference_engine: "vllm_direct",
        },
    }))
}

fn parse_mode(s: &str) -> Option<OcrMode> {
    serde_json::from_value(serde_json::Value::String(s.to_string())).ok()
}
