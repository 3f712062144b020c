use jay_ocr_core::{PdfProcessingResult, ProgressSnapshot};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of input a task was created for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Image,
    Pdf,
}

/// Lifecycle state of a task: `Pending -> Running -> {Succeeded, Failed}`.
/// No other transitions are permitted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// The structured payload persisted once a task leaves `Running`, plus the
/// live progress snapshot present from the moment it enters `Running`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<ProgressSnapshot>,
    #[serde(flatten)]
    pub pdf: Option<PdfProcessingResult>,
}

/// A durable task row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub input_path: String,
    pub output_dir: Option<String>,
    pub result_payload: ResultPayload,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Task {
    pub fn new(task_type: TaskType, input_path: String) -> Self {
        let now = iso_now();
        Self {
            id: Uuid::new_v4(),
            task_type,
            status: TaskStatus::Pending,
            input_path,
            output_dir: None,
            result_payload: ResultPayload::default(),
            error_message: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// ISO 8601 UTC timestamp, e.g. `2026-02-19T01:12:24Z`.
pub fn iso_now() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
