use crate::jobs::store::TaskStore;
use jay_ocr_core::{InferenceClient, PdfBackend, Settings};
use jay_ocr_storage::StorageBackend;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// Shared application state, handed to every route via axum's extension
/// mechanism.
#[derive(Clone)]
pub struct AppState {
    pub store: TaskStore,
    /// Sender side of the in-process broker stand-in: the upload route
    /// pushes a task id here; the dispatcher loop drains it.
    pub task_sender: UnboundedSender<Uuid>,
    pub pdf_backend: Arc<dyn PdfBackend>,
    /// Used directly by the synchronous single-image OCR route, which has
    /// no task row and so bypasses the PDF backend/dispatcher entirely.
    pub inference_client: Arc<dyn InferenceClient>,
    pub settings: Arc<Settings>,
    /// Backend for input/output artifact I/O, rooted at `settings.storage_dir`.
    pub storage: Arc<dyn StorageBackend>,
}

impl AppState {
    pub fn new(
        store: TaskStore,
        task_sender: UnboundedSender<Uuid>,
        pdf_backend: Arc<dyn PdfBackend>,
        inference_client: Arc<dyn InferenceClient>,
        settings: Arc<Settings>,
        storage: Arc<dyn StorageBackend>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            task_sender,
            pdf_backend,
            inference_client,
            settings,
            storage,
        })
    }
}
