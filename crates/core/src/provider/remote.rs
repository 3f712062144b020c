use crate::error::{CoreError, CoreResult};
use crate::provider::{InferenceClient, SizingOptions};
use async_trait::async_trait;
use base64::Engine as _;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Serialize)]
struct InferRequest {
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_base64: Option<String>,
    base_size: u32,
    image_size: u32,
    crop_mode: bool,
}

#[derive(Deserialize)]
struct InferResponse {
    text: String,
}

/// Remote inference backend: POSTs to a worker-internal HTTP endpoint
/// (`/internal/infer`) rather than running a model in-process. Concurrency
/// is bounded by a fixed-size permit pool sized to the PDF concurrency cap,
/// standing in for the source's thread-pool executor.
pub struct RemoteInferenceClient {
    http: reqwest::Client,
    url: String,
    token: String,
    semaphore: Arc<Semaphore>,
}

impl RemoteInferenceClient {
    pub fn new(url: String, token: String, max_concurrency: usize) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client builds with static config");
        Self {
            http,
            url,
            token,
            semaphore: Arc::new(Semaphore::new(max_concurrency.max(1))),
        }
    }
}

fn encode_jpeg(image: &DynamicImage) -> CoreResult<String> {
    let mut buf = Vec::new();
    image
        .to_rgb8()
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Jpeg)
        .map_err(|e| CoreError::Image(e.to_string()))?;
    Ok(base64::engine::general_purpose::STANDARD.encode(buf))
}

#[async_trait]
impl InferenceClient for RemoteInferenceClient {
    async fn submit(
        &self,
        prompt: &str,
        image: Option<&DynamicImage>,
        sizing: SizingOptions,
    ) -> CoreResult<String> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| CoreError::Inference(e.to_string()))?;

        let image_base64 = image.map(encode_jpeg).transpose()?;
        let body = InferRequest {
            prompt: prompt.to_string(),
            image_base64,
            base_size: sizing.base_size,
            image_size: sizing.image_size,
            crop_mode: sizing.crop_mode,
        };

        let response = self
            .http
            .post(&self.url)
            .header("X-Internal-Token", &self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::Inference(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(CoreError::Inference(format!(
                "inference endpoint returned {}",
                response.status()
            )));
        }

        let parsed: InferResponse = response
            .json()
            .await
            .map_err(|e| CoreError::Inference(format!("malformed response body: {e}")))?;

        Ok(parsed.text)
    }

    fn is_ready(&self) -> bool {
        // The remote engine has no local load state to report; once a URL
        // is configured it's considered ready.
        true
    }
}
