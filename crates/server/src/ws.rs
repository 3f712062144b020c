use axum::{
    extract::{Path, State, WebSocketUpgrade},
    response::Response,
};
use axum::extract::ws::{Message, WebSocket};
use std::sync::Arc;
use uuid::Uuid;

use crate::jobs::models::TaskStatus;
use crate::state::AppState;

/// WebSocket progress stream for a task, sourced from the same channel the
/// task store's CAS `update_progress` broadcasts on.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(task_id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, task_id, state))
}

async fn handle_socket(mut socket: WebSocket, task_id: Uuid, state: Arc<AppState>) {
    let rx = state.store.subscribe_progress(&task_id).await;
    let Some(mut rx) = rx else {
        let _ = socket
            .send(Message::Text(
                serde_json::json!({"detail": "NotFound: task not found"}).to_string().into(),
            ))
            .await;
        return;
    };

    if let Some(task) = state.store.get(&task_id) {
        let msg = serde_json::to_string(&task).unwrap_or_default();
        if socket.send(Message::Text(msg.into())).await.is_err() {
            return;
        }
        if matches!(task.status, TaskStatus::Succeeded | TaskStatus::Failed) {
            return;
        }
    }

    loop {
        match rx.recv().await {
            Ok(snapshot) => {
                let msg = serde_json::to_string(&snapshot).unwrap_or_default();
                if socket.send(Message::Text(msg.into())).await.is_err() {
                    break;
                }
                if snapshot.current == snapshot.total && snapshot.total > 0 {
                    break;
                }
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
        }
    }
}
