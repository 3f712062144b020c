use crate::error::CoreResult;
use crate::provider::engine::GenerativeEngine;
use crate::provider::{InferenceClient, SizingOptions};
use async_trait::async_trait;
use base64::Engine as _;
use image::DynamicImage;
use std::io::Cursor;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Local inference backend: owns a single long-lived [`GenerativeEngine`]
/// and bounds outstanding requests with a semaphore rather than relying on
/// the engine's own internal batching to protect it from overload.
pub struct LocalInferenceClient {
    engine: Arc<dyn GenerativeEngine>,
    semaphore: Arc<Semaphore>,
}

impl LocalInferenceClient {
    pub fn new(engine: Arc<dyn GenerativeEngine>, max_concurrency: usize) -> Self {
        Self {
            engine,
            semaphore: Arc::new(Semaphore::new(max_concurrency.max(1))),
        }
    }

    /// Initialize the underlying engine. Call once at process startup.
    pub async fn init(&self) -> CoreResult<()> {
        self.engine.init().await
    }

    /// Tear down the underlying engine. Call once at process shutdown.
    pub async fn shutdown(&self) -> CoreResult<()> {
        self.engine.shutdown().await
    }
}

fn encode_jpeg(image: &DynamicImage) -> CoreResult<String> {
    let mut buf = Vec::new();
    image
        .to_rgb8()
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Jpeg)
        .map_err(|e| crate::error::CoreError::Image(e.to_string()))?;
    Ok(base64::engine::general_purpose::STANDARD.encode(buf))
}

#[async_trait]
impl InferenceClient for LocalInferenceClient {
    async fn submit(
        &self,
        prompt: &str,
        image: Option<&DynamicImage>,
        _sizing: SizingOptions,
    ) -> CoreResult<String> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| crate::error::CoreError::Inference(e.to_string()))?;

        let image_b64 = image.map(encode_jpeg).transpose()?;
        self.engine.generate(prompt, image_b64.as_deref()).await
    }

    fn is_ready(&self) -> bool {
        self.engine.is_loaded()
    }
}
