pub mod errors;
pub mod models;
pub mod routes;

use std::sync::Arc;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use crate::engine::Engine;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

impl AppState {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(routes::health::health_check))
        .route("/api/jobs", get(routes::jobs::list_jobs))
        .route("/api/jobs/:category", post(routes::jobs::start_job).get(routes::jobs::get_job))
        .route("/api/jobs/:category/stop", post(routes::jobs::stop_job))
        .route("/api/jobs/:category/pause", post(routes::jobs::pause_job))
        .route("/api/jobs/:category/resume", post(routes::jobs::resume_job))
        .route("/api/jobs/:category/events", get(routes::events::stream_events))
        .route("/api/history", get(routes::history::list_history))
        .route("/api/history/:id", get(routes::history::get_history))
        .route("/api/dictionaries", get(routes::dictionaries::list_dictionaries))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
