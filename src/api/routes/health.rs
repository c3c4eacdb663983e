use axum::{extract::State, Json};
use crate::api::models::HealthResponse;
use crate::api::AppState;

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "jackal",
        version: env!("CARGO_PKG_VERSION"),
        git_hash: option_env!("GIT_HASH"),
        running_jobs: state.engine.controller.running().len(),
        recording: state.engine.is_recording(),
    })
}
