mod engine;
mod local;
mod remote;

pub use engine::{GenaiEngine, GenerativeEngine};
pub use local::LocalInferenceClient;
pub use remote::RemoteInferenceClient;

use crate::config::Settings;
use async_trait::async_trait;
use image::DynamicImage;
use std::sync::Arc;

use crate::error::CoreResult;

/// Size hints accepted by the model alongside a prompt/image pair.
/// `test_compress` is reserved: threaded through for wire compatibility
/// but never branched on.
#[derive(Debug, Clone, Copy)]
pub struct SizingOptions {
    pub base_size: u32,
    pub image_size: u32,
    pub crop_mode: bool,
    pub test_compress: bool,
}

impl Default for SizingOptions {
    fn default() -> Self {
        Self {
            base_size: 1024,
            image_size: 640,
            crop_mode: true,
            test_compress: false,
        }
    }
}

impl SizingOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            base_size: settings.base_size,
            image_size: settings.image_size,
            crop_mode: settings.crop_mode,
            test_compress: false,
        }
    }
}

/// A single `(prompt, image?, sizing) -> raw text` inference request.
///
/// Two interchangeable backends implement this: [`LocalInferenceClient`]
/// (in-process generative engine) and [`RemoteInferenceClient`] (HTTP POST
/// to a worker-internal inference endpoint). Both enforce their own
/// concurrency bound internally; callers never need to serialize calls.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn submit(
        &self,
        prompt: &str,
        image: Option<&DynamicImage>,
        sizing: SizingOptions,
    ) -> CoreResult<String>;

    /// Best-effort health check: whether the backing engine/endpoint is
    /// believed to be ready to serve requests right now.
    fn is_ready(&self) -> bool;
}

/// Build the configured inference client: remote if `WORKER_REMOTE_INFER_URL`
/// is set, local otherwise.
pub fn create_inference_client(settings: &Settings) -> Arc<dyn InferenceClient> {
    if let Some(url) = &settings.worker_remote_infer_url {
        Arc::new(RemoteInferenceClient::new(
            url.clone(),
            settings.internal_api_token.clone(),
            settings.pdf_max_concurrency,
        ))
    } else {
        let engine: Arc<dyn GenerativeEngine> =
            Arc::new(GenaiEngine::new(settings.model_path.clone()));
        Arc::new(LocalInferenceClient::new(engine, settings.pdf_max_concurrency))
    }
}
