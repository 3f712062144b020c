use super::models::{ResultPayload, Task, TaskStatus, TaskType};
use jay_ocr_core::ProgressSnapshot;
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

/// Durable task store, backed by SQLite in WAL mode. The only shared mutable
/// state in the system; every mutation goes through one of the methods
/// below, each of which is a single SQL statement so row-level races reduce
/// to SQLite's own write serialization.
#[derive(Clone)]
pub struct TaskStore {
    db: Arc<StdMutex<Connection>>,
    /// Per-task broadcast senders for live progress events (in-memory only,
    /// not persisted — a fresh subscriber after a restart just sees nothing
    /// until the next update).
    progress_senders: Arc<Mutex<HashMap<Uuid, broadcast::Sender<ProgressSnapshot>>>>,
}

impl TaskStore {
    /// Open (or create) the task store at `db_path`, marking any row left
    /// `running` or `pending` by a previous process as `failed`: a task
    /// cannot be resumed once its owning process has died.
    pub fn open(db_path: &Path) -> Result<Self, rusqlite::Error> {
        if let Some(parent) = db_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS tasks (
                id              TEXT PRIMARY KEY,
                task_type       TEXT NOT NULL,
                status          TEXT NOT NULL DEFAULT 'pending',
                input_path      TEXT NOT NULL,
                output_dir      TEXT,
                result_payload  TEXT NOT NULL DEFAULT '{}',
                error_message   TEXT,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );",
        )?;

        let now = super::models::iso_now();
        let updated = conn.execute(
            "UPDATE tasks SET status = 'failed', error_message = 'Interrupted by server restart', updated_at = ?1
             WHERE status IN ('running', 'pending')",
            params![now],
        )?;
        if updated > 0 {
            tracing::warn!(count = updated, "recovered interrupted tasks on startup");
        }

        tracing::info!(path = %db_path.display(), "task store opened");

        Ok(Self {
            db: Arc::new(StdMutex::new(conn)),
            progress_senders: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Insert a new task row in `pending`.
    pub async fn create(&self, task_type: TaskType, input_path: String) -> Uuid {
        let task = Task::new(task_type, input_path);
        let id = task.id;
        let payload_json = serde_json::to_string(&task.result_payload).expect("ResultPayload serializes");

        {
            let db = self.db.lock().expect("db lock poisoned");
            db.execute(
                "INSERT INTO tasks (id, task_type, status, input_path, result_payload, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    id.to_string(),
                    type_to_str(task_type),
                    status_to_str(TaskStatus::Pending),
                    task.input_path,
                    payload_json,
                    task.created_at,
                    task.updated_at,
                ],
            )
            .expect("failed to insert task");
        }

        let (tx, _) = broadcast::channel(256);
        self.progress_senders.lock().await.insert(id, tx);
        id
    }

    /// Overwrite `input_path` on a still-`pending` row. Used when the final
    /// on-disk location depends on the id the store just assigned.
    pub async fn set_input_path(&self, id: &Uuid, input_path: String) -> bool {
        let db = self.db.lock().expect("db lock poisoned");
        db.execute(
            "UPDATE tasks SET input_path = ?1, updated_at = ?2 WHERE id = ?3 AND status = 'pending'",
            params![input_path, super::models::iso_now(), id.to_string()],
        )
        .map(|n| n > 0)
        .unwrap_or(false)
    }

    pub fn get(&self, id: &Uuid) -> Option<Task> {
        let db = self.db.lock().expect("db lock poisoned");
        db.query_row(
            "SELECT id, task_type, status, input_path, output_dir, result_payload, error_message, created_at, updated_at
             FROM tasks WHERE id = ?1",
            params![id.to_string()],
            row_to_task,
        )
        .ok()
    }

    pub fn list(&self) -> Vec<Task> {
        let db = self.db.lock().expect("db lock poisoned");
        let mut stmt = db
            .prepare(
                "SELECT id, task_type, status, input_path, output_dir, result_payload, error_message, created_at, updated_at
                 FROM tasks ORDER BY created_at DESC",
            )
            .expect("failed to prepare list query");
        stmt.query_map([], row_to_task)
            .expect("failed to query tasks")
            .filter_map(|r| r.ok())
            .collect()
    }

    /// `pending -> running`; seeds `result_payload.progress` with a started
    /// snapshot so invariant I2 ("progress present from the moment status =
    /// running") holds immediately.
    pub async fn mark_running(&self, id: &Uuid, output_dir: String) {
        let payload = ResultPayload {
            progress: Some(ProgressSnapshot::new(0, 0, "started")),
            pdf: None,
        };
        let payload_json = serde_json::to_string(&payload).expect("ResultPayload serializes");
        let db = self.db.lock().expect("db lock poisoned");
        db.execute(
            "UPDATE tasks SET status = 'running', output_dir = ?1, result_payload = ?2, updated_at = ?3
             WHERE id = ?4 AND status = 'pending'",
            params![output_dir, payload_json, super::models::iso_now(), id.to_string()],
        )
        .ok();
    }

    /// Compare-and-set progress update: only takes effect if the task is
    /// still `running`. Returns whether the row was updated. Snapshots
    /// whose message indicates intake noise ("queued") are dropped.
    pub async fn update_progress(&self, id: &Uuid, snapshot: ProgressSnapshot) -> bool {
        if snapshot.message.contains("queued") {
            return false;
        }

        let updated = {
            let Some(task) = self.get(id) else {
                return false;
            };
            if task.status != TaskStatus::Running {
                return false;
            }
            let mut payload = task.result_payload;
            payload.progress = Some(snapshot.clone());
            let payload_json = serde_json::to_string(&payload).expect("ResultPayload serializes");

            let db = self.db.lock().expect("db lock poisoned");
            db.execute(
                "UPDATE tasks SET result_payload = ?1, updated_at = ?2 WHERE id = ?3 AND status = 'running'",
                params![payload_json, super::models::iso_now(), id.to_string()],
            )
            .map(|n| n > 0)
            .unwrap_or(false)
        };

        if updated {
            if let Some(tx) = self.progress_senders.lock().await.get(id) {
                let _ = tx.send(snapshot);
            }
        }
        updated
    }

    /// `running -> succeeded`, atomically overwriting `result_payload` with
    /// the final payload.
    pub async fn mark_succeeded(&self, id: &Uuid, result: jay_ocr_core::PdfProcessingResult) {
        let total = result.total_pages;
        let payload = ResultPayload {
            progress: Some(ProgressSnapshot::new(total, total, "done").with_pages(total, total)),
            pdf: Some(result),
        };
        let payload_json = serde_json::to_string(&payload).expect("ResultPayload serializes");
        let db = self.db.lock().expect("db lock poisoned");
        db.execute(
            "UPDATE tasks SET status = 'succeeded', result_payload = ?1, updated_at = ?2
             WHERE id = ?3 AND status = 'running'",
            params![payload_json, super::models::iso_now(), id.to_string()],
        )
        .ok();
    }

    /// `running -> failed`. Preserves the last known progress snapshot but
    /// overwrites its message, and truncates `error_message` to 2000 chars.
    pub async fn mark_failed(&self, id: &Uuid, message: String) {
        let truncated: String = message.chars().take(2000).collect();

        let payload = {
            let mut payload = self.get(id).map(|t| t.result_payload).unwrap_or_default();
            if let Some(progress) = payload.progress.as_mut() {
                progress.message = format!("failed: {truncated}");
            } else {
                payload.progress = Some(ProgressSnapshot::new(0, 0, format!("failed: {truncated}")));
            }
            payload
        };
        let payload_json = serde_json::to_string(&payload).expect("ResultPayload serializes");

        let db = self.db.lock().expect("db lock poisoned");
        db.execute(
            "UPDATE tasks SET status = 'failed', error_message = ?1, result_payload = ?2, updated_at = ?3
             WHERE id = ?4 AND status = 'running'",
            params![truncated, payload_json, super::models::iso_now(), id.to_string()],
        )
        .ok();
    }

    pub async fn delete(&self, id: &Uuid) -> bool {
        let removed = {
            let db = self.db.lock().expect("db lock poisoned");
            db.execute("DELETE FROM tasks WHERE id = ?1", params![id.to_string()])
                .map(|n| n > 0)
                .unwrap_or(false)
        };
        self.progress_senders.lock().await.remove(id);
        removed
    }

    pub async fn subscribe_progress(&self, id: &Uuid) -> Option<broadcast::Receiver<ProgressSnapshot>> {
        self.progress_senders.lock().await.get(id).map(|tx| tx.subscribe())
    }
}

fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<Task> {
    let id_str: String = row.get(0)?;
    let task_type_str: String = row.get(1)?;
    let status_str: String = row.get(2)?;
    let input_path: String = row.get(3)?;
    let output_dir: Option<String> = row.get(4)?;
    let payload_json: String = row.get(5)?;
    let error_message: Option<String> = row.get(6)?;
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;

    Ok(Task {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        task_type: parse_type(&task_type_str),
        status: parse_status(&status_str),
        input_path,
        output_dir,
        result_payload: serde_json::from_str(&payload_json).unwrap_or_default(),
        error_message,
        created_at,
        updated_at,
    })
}

fn type_to_str(t: TaskType) -> &'static str {
    match t {
        TaskType::Image => "image",
        TaskType::Pdf => "pdf",
    }
}

fn parse_type(s: &str) -> TaskType {
    match s {
        "image" => TaskType::Image,
        _ => TaskType::Pdf,
    }
}

fn status_to_str(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "pending",
        TaskStatus::Running => "running",
        TaskStatus::Succeeded => "succeeded",
        TaskStatus::Failed => "failed",
    }
}

fn parse_status(s: &str) -> TaskStatus {
    match s {
        "pending" => TaskStatus::Pending,
        "running" => TaskStatus::Running,
        "succeeded" => TaskStatus::Succeeded,
        _ => TaskStatus::Failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn update_progress_is_noop_once_terminal() {
        let dir = std::env::temp_dir().join(format!("jay-ocr-test-store-{}", Uuid::new_v4()));
        let store = TaskStore::open(&dir.join("tasks.db")).unwrap();
        let id = store.create(TaskType::Pdf, "/tmp/in.pdf".to_string()).await;
        store.mark_running(&id, "/tmp/out".to_string()).await;

        let result = jay_ocr_core::PdfProcessingResult {
            markdown_file: "result.md".into(),
            raw_json_file: "raw.json".into(),
            archive_file: "result.zip".into(),
            pages: vec![],
            image_assets: vec![],
            total_pages: 0,
        };
        store.mark_succeeded(&id, result).await;

        let updated = store.update_progress(&id, ProgressSnapshot::new(1, 1, "late update")).await;
        assert!(!updated);
        assert_eq!(store.get(&id).unwrap().status, TaskStatus::Succeeded);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn restart_marks_stale_rows_failed() {
        let dir = std::env::temp_dir().join(format!("jay-ocr-test-restart-{}", Uuid::new_v4()));
        let db_path = dir.join("tasks.db");
        {
            let store = TaskStore::open(&db_path).unwrap();
            let id = store.create(TaskType::Pdf, "/tmp/in.pdf".to_string()).await;
            store.mark_running(&id, "/tmp/out".to_string()).await;
        }
        let store = TaskStore::open(&db_path).unwrap();
        let task = store.list().into_iter().next().unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error_message.as_deref(), Some("Interrupted by server restart"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
