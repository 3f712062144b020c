use serde::{Deserialize, Serialize};

/// A point-in-time snapshot of a job's progress, shaped to match the
/// structure broadcast over the job's status channel and persisted in the
/// task row's `progress` column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub current: u32,
    pub total: u32,
    pub percent: f64,
    pub message: String,
    pub pages_completed: Option<u32>,
    pub pages_total: Option<u32>,
}

impl ProgressSnapshot {
    pub fn new(current: u32, total: u32, message: impl Into<String>) -> Self {
        let percent = if total == 0 {
            0.0
        } else {
            (current as f64 / total as f64) * 100.0
        };
        Self {
            current,
            total,
            percent,
            message: message.into(),
            pages_completed: None,
            pages_total: None,
        }
    }

    pub fn with_pages(mut self, completed: u32, total_pages: u32) -> Self {
        self.pages_completed = Some(completed);
        self.pages_total = Some(total_pages);
        self
    }
}

/// Sending half of a job's progress channel. The pipeline pushes snapshots
/// as pages complete; a consumer task drains them into the task store and
/// any live WebSocket subscribers, decoupling the blocking render/infer work
/// from whoever is watching progress.
pub type ProgressSender = tokio::sync::mpsc::UnboundedSender<ProgressSnapshot>;
pub type ProgressReceiver = tokio::sync::mpsc::UnboundedReceiver<ProgressSnapshot>;

/// Create a progress channel pair for a single job.
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}

/// CLI-facing progress sink, invoked synchronously as pages complete.
/// Distinct from [`ProgressSnapshot`]/[`ProgressSender`]: the CLI runs a
/// single job in the foreground and wants direct callbacks to drive an
/// indicatif bar, not a channel to decouple producer from consumer.
pub trait ProgressReporter: Send + Sync {
    fn on_pdf_start(&self, filename: &str, total_pages: u32);
    fn on_page_complete(&self, page_num: u32, total_pages: u32);
    fn on_pdf_complete(&self, filename: &str, total_pages: u32);
    fn on_error(&self, page_num: u32, error: &str);
}

/// A no-op progress reporter that discards all events.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {
    fn on_pdf_start(&self, _filename: &str, _total_pages: u32) {}
    fn on_page_complete(&self, _page_num: u32, _total_pages: u32) {}
    fn on_pdf_complete(&self, _filename: &str, _total_pages: u32) {}
    fn on_error(&self, _page_num: u32, _error: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_computed_from_current_and_total() {
        let snap = ProgressSnapshot::new(3, 10, "rendering");
        assert_eq!(snap.percent, 30.0);
    }

    #[test]
    fn zero_total_does_not_divide_by_zero() {
        let snap = ProgressSnapshot::new(0, 0, "starting");
        assert_eq!(snap.percent, 0.0);
    }

    #[test]
    fn with_pages_sets_optional_fields() {
        let snap = ProgressSnapshot::new(1, 5, "page done").with_pages(1, 5);
        assert_eq!(snap.pages_completed, Some(1));
        assert_eq!(snap.pages_total, Some(5));
    }
}
