use crate::error::CoreResult;
use async_trait::async_trait;
use genai::chat::{ChatMessage, ChatRequest, ContentPart, MessageContent};
use genai::Client;
use tokio::sync::RwLock;

/// The process-wide, black-box generative model runtime.
///
/// Deliberately out of scope for this crate to implement: this trait only
/// specifies the shape the Local inference backend needs — `init`/`shutdown`
/// as an explicit lifecycle (no lazy-init races), and `generate` for a
/// single request. [`GenaiEngine`] is the concrete instance used when no
/// dedicated model-serving process is configured.
#[async_trait]
pub trait GenerativeEngine: Send + Sync {
    async fn init(&self) -> CoreResult<()>;
    async fn shutdown(&self) -> CoreResult<()>;
    async fn generate(&self, prompt: &str, image_b64: Option<&str>) -> CoreResult<String>;
    fn is_loaded(&self) -> bool;
}

/// A [`GenerativeEngine`] backed by the `genai` multi-provider chat client,
/// selecting a provider from the configured model name the same way the
/// model name itself would (e.g. `claude-*`, `gpt-*`, or an Ollama-style
/// bare model tag).
pub struct GenaiEngine {
    model: String,
    client: Client,
    loaded: RwLock<bool>,
}

impl GenaiEngine {
    pub fn new(model: String) -> Self {
        Self {
            model,
            client: Client::default(),
            loaded: RwLock::new(false),
        }
    }
}

#[async_trait]
impl GenerativeEngine for GenaiEngine {
    async fn init(&self) -> CoreResult<()> {
        tracing::info!(model = %self.model, "initializing generative engine");
        *self.loaded.write().await = true;
        Ok(())
    }

    async fn shutdown(&self) -> CoreResult<()> {
        tracing::info!("shutting down generative engine");
        *self.loaded.write().await = false;
        Ok(())
    }

    async fn generate(&self, prompt: &str, image_b64: Option<&str>) -> CoreResult<String> {
        let message = match image_b64 {
            Some(b64) => {
                let image_part = ContentPart::from_binary_base64("image/jpeg", b64, None::<String>);
                ChatMessage::user(MessageContent::from_text(prompt).append(image_part))
            }
            None => ChatMessage::user(prompt),
        };

        let request = ChatRequest::from_messages(vec![message]);
        let response = self
            .client
            .exec_chat(&self.model, request, None)
            .await
            .map_err(|e| crate::error::CoreError::Inference(e.to_string()))?;

        Ok(response.first_text().unwrap_or_default().trim().to_string())
    }

    fn is_loaded(&self) -> bool {
        // Best-effort synchronous snapshot; try_read avoids blocking callers
        // that only want a health-check hint.
        self.loaded.try_read().map(|g| *g).unwrap_or(false)
    }
}
