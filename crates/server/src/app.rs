use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::routes;
use crate::state::AppState;
use crate::ws;

/// Build the Axum application router.
pub fn create_app(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/api/health", get(routes::health::health_check))
        .route("/api/ocr", post(routes::ocr::ocr_image))
        .route("/api/upload", post(routes::upload::upload_pdf))
        .route("/api/jobs", get(routes::jobs::list_jobs))
        .route("/api/jobs/{id}", get(routes::jobs::get_job))
        .route("/api/jobs/{id}", delete(routes::jobs::delete_job))
        .route("/api/results/{id}", get(routes::results::get_results))
        .route("/api/results/{id}/export", get(routes::export::export_zip))
        .route("/api/config", get(routes::config::get_config))
        .route("/internal/infer", post(routes::internal::infer));

    let ws_route = Router::new().route("/ws/{id}", get(ws::ws_handler));

    let images_service = ServeDir::new(state.settings.storage_dir.join("outputs"));

    let max_upload_bytes = (state.settings.max_upload_size_mb * 1024 * 1024) as usize;

    Router::new()
        .merge(api_routes)
        .merge(ws_route)
        .nest_service("/outputs", images_service)
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}
