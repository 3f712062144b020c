pub mod backend;
pub mod config;
pub mod error;
pub mod grounding;
pub mod pdf;
pub mod pipeline;
pub mod progress;
pub mod prompt;
pub mod provider;

pub use backend::{create_pdf_backend, LocalPdfBackend, PdfBackend, SubprocessPdfBackend};
pub use config::Settings;
pub use error::{CoreError, CoreResult};
pub use grounding::BoundingBox;
pub use pdf::PdfEngine;
pub use pipeline::{process_pdf, PageResult, PdfProcessingResult};
pub use progress::{progress_channel, ProgressReceiver, ProgressReporter, ProgressSender, ProgressSnapshot};
pub use prompt::{build as build_prompt, OcrMode, PromptOptions};
pub use provider::{create_inference_client, InferenceClient, SizingOptions};
