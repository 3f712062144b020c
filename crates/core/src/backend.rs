use crate::error::{CoreError, CoreResult};
use crate::pipeline::{self, PdfProcessingResult};
use crate::progress::{ProgressSender, ProgressSnapshot};
use crate::provider::{InferenceClient, SizingOptions};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Execution strategy for the Page Pipeline and Job Orchestrator: either
/// run in-process, or delegate to an external worker binary over a
/// JSON-lines protocol. Both report progress through the same channel and
/// return the same result shape.
#[async_trait]
pub trait PdfBackend: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    async fn process(
        &self,
        input_path: &Path,
        output_dir: &Path,
        prompt: String,
        sizing: SizingOptions,
        dpi: f32,
        concurrency: usize,
        progress: ProgressSender,
    ) -> CoreResult<PdfProcessingResult>;
}

/// In-process backend: runs the full rasterize/infer/rewrite/package
/// algorithm directly. The default when no external worker binary is
/// configured, and the only backend exercised by tests (it needs nothing
/// outside the process).
pub struct LocalPdfBackend {
    client: Arc<dyn InferenceClient>,
}

impl LocalPdfBackend {
    pub fn new(client: Arc<dyn InferenceClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PdfBackend for LocalPdfBackend {
    async fn process(
        &self,
        input_path: &Path,
        output_dir: &Path,
        prompt: String,
        sizing: SizingOptions,
        dpi: f32,
        concurrency: usize,
        progress: ProgressSender,
    ) -> CoreResult<PdfProcessingResult> {
        pipeline::process_pdf(
            input_path,
            output_dir,
            self.client.clone(),
            prompt,
            sizing,
            dpi,
            concurrency,
            progress,
        )
        .await
    }
}

#[derive(Serialize)]
struct WorkerConfig {
    input_path: PathBuf,
    output_dir: PathBuf,
    prompt: String,
    base_size: u32,
    image_size: u32,
    crop_mode: bool,
    dpi: f32,
    concurrency: usize,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WorkerEvent {
    Progress(ProgressSnapshot),
    Result(PdfProcessingResult),
    Error { message: String },
}

/// Delegates to an external worker process: writes a JSON config file,
/// spawns the worker with its path as the sole argument, and reads a
/// JSON-lines event stream from its stdout. `progress`/`result`/`error` are
/// the only event types recognized; a worker that exits without a `result`
/// event is treated as a protocol violation.
pub struct SubprocessPdfBackend {
    worker_bin: PathBuf,
}

impl SubprocessPdfBackend {
    pub fn new(worker_bin: PathBuf) -> Self {
        Self { worker_bin }
    }
}

#[async_trait]
impl PdfBackend for SubprocessPdfBackend {
    async fn process(
        &self,
        input_path: &Path,
        output_dir: &Path,
        prompt: String,
        sizing: SizingOptions,
        dpi: f32,
        concurrency: usize,
        progress: ProgressSender,
    ) -> CoreResult<PdfProcessingResult> {
        let config = WorkerConfig {
            input_path: input_path.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
            prompt,
            base_size: sizing.base_size,
            image_size: sizing.image_size,
            crop_mode: sizing.crop_mode,
            dpi,
            concurrency,
        };

        std::fs::create_dir_all(output_dir)?;
        let config_path = output_dir.join("worker_config.json");
        std::fs::write(&config_path, serde_json::to_vec(&config)?)?;

        let mut child = tokio::process::Command::new(&self.worker_bin)
            .arg(&config_path)
            .stdout(Stdio::piped())
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CoreError::State("worker process has no stdout pipe".to_string()))?;
        let mut lines = BufReader::new(stdout).lines();

        let mut final_result = None;
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let event: WorkerEvent = serde_json::from_str(&line)
                .map_err(|e| CoreError::Parse(format!("malformed worker event: {e}")))?;
            match event {
                WorkerEvent::Progress(snapshot) => {
                    let _ = progress.send(snapshot);
                }
                WorkerEvent::Result(result) => final_result = Some(result),
                WorkerEvent::Error { message } => {
                    let _ = child.kill().await;
                    return Err(CoreError::Inference(message));
                }
            }
        }

        child.wait().await?;

        final_result
            .ok_or_else(|| CoreError::State("worker exited without a result event".to_string()))
    }
}

/// Build the configured PDF backend: subprocess if `PDF_WORKER_BIN` is set
/// and exists, local otherwise.
pub fn create_pdf_backend(
    settings: &crate::config::Settings,
    client: Arc<dyn InferenceClient>,
) -> Arc<dyn PdfBackend> {
    if crate::config::uses_subprocess_pdf_backend(settings) {
        Arc::new(SubprocessPdfBackend::new(
            settings.pdf_worker_bin.clone().expect("checked by uses_subprocess_pdf_backend"),
        ))
    } else {
        Arc::new(LocalPdfBackend::new(client))
    }
}
