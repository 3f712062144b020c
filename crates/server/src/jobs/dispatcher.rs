use super::models::TaskType;
use super::store::TaskStore;
use jay_ocr_core::{progress_channel, PdfBackend, ProgressSnapshot};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

/// Consumes task IDs from the in-process broker stand-in and runs each one
/// to completion. Exceptions never propagate past this loop: any failure
/// while running a task is translated into `mark_failed` and logged, and the
/// dispatcher moves on to the next task id.
pub async fn run(
    mut tasks: tokio::sync::mpsc::UnboundedReceiver<Uuid>,
    store: TaskStore,
    backend: Arc<dyn PdfBackend>,
    storage_dir: PathBuf,
    prompt: String,
    sizing: jay_ocr_core::SizingOptions,
    dpi: f32,
    concurrency: usize,
) {
    while let Some(task_id) = tasks.recv().await {
        let span = tracing::info_span!("task", task_id = %task_id);
        let _enter = span.enter();

        let Some(task) = store.get(&task_id) else {
            tracing::warn!("task not found, dropping");
            continue;
        };
        if task.task_type != TaskType::Pdf {
            tracing::warn!("dispatcher only handles pdf tasks");
            continue;
        }

        let output_dir = storage_dir.join("outputs").join(task_id.to_string());
        store.mark_running(&task_id, output_dir.to_string_lossy().to_string()).await;

        let (progress_tx, mut progress_rx) = progress_channel();
        let store_for_progress = store.clone();
        let progress_task_id = task_id;
        let progress_consumer = tokio::spawn(async move {
            while let Some(snapshot) = progress_rx.recv().await {
                store_for_progress.update_progress(&progress_task_id, snapshot).await;
            }
        });

        let input_path = PathBuf::from(&task.input_path);
        let result = backend
            .process(
                &input_path,
                &output_dir,
                prompt.clone(),
                sizing,
                dpi,
                concurrency,
                progress_tx,
            )
            .await;

        let _ = progress_consumer.await;

        match result {
            Ok(pdf_result) => {
                tracing::info!(pages = pdf_result.total_pages, "task succeeded");
                store.mark_succeeded(&task_id, pdf_result).await;
            }
            Err(err) => {
                tracing::error!(error = %err, "task failed");
                store.mark_failed(&task_id, err.to_string()).await;
            }
        }
    }
}

/// Convenience reporter for an emitted terminal snapshot, used by routes
/// that need to synthesize a "queued" progress row before the dispatcher
/// picks a task up.
pub fn queued_snapshot() -> ProgressSnapshot {
    ProgressSnapshot::new(0, 0, "queued")
}
