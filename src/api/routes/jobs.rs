use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::info;
use crate::api::models::{JobsResponse, PauseResponse, StopResponse};
use crate::api::AppState;
use crate::errors::EngineError;
use crate::pipeline::{JobCategory, JobConfig, JobSnapshot};
use super::parse_category;

pub async fn list_jobs(State(state): State<AppState>) -> Json<JobsResponse> {
    let controller = &state.engine.controller;
    Json(JobsResponse {
        running: controller.running(),
        latest: JobCategory::ALL.iter().filter_map(|c| controller.status(*c)).collect(),
    })
}

/// Body is the category's job config without the `category` tag.
pub async fn start_job(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<JobSnapshot>), EngineError> {
    let category = parse_category(&category)?;
    let config = JobConfig::from_json(category, body)?;
    let handle = state.engine.controller.start(config).await?;
    info!(job_id = %handle.id(), category = %category, "Job accepted via API");
    Ok((StatusCode::ACCEPTED, Json(handle.snapshot())))
}

pub async fn get_job(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Json<JobSnapshot>, (StatusCode, Json<Value>)> {
    let category = parse_category(&category)
        .map_err(|e| (StatusCode::BAD_REQUEST, Json(json!({"error": e.to_string()}))))?;
    state
        .engine
        .controller
        .status(category)
        .map(Json)
        .ok_or_else(|| (StatusCode::NOT_FOUND, Json(json!({"error": format!("No {} job yet", category)}))))
}

pub async fn stop_job(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Json<StopResponse>, EngineError> {
    let category = parse_category(&category)?;
    let stopped = state.engine.controller.stop(category);
    Ok(Json(StopResponse { category: category.to_string(), stopped }))
}

pub async fn pause_job(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Json<PauseResponse>, EngineError> {
    let category = parse_category(&category)?;
    let found = state.engine.controller.pause(category);
    Ok(Json(PauseResponse { category: category.to_string(), found, paused: found }))
}

pub async fn resume_job(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Json<PauseResponse>, EngineError> {
    let category = parse_category(&category)?;
    let found = state.engine.controller.resume(category);
    Ok(Json(PauseResponse { category: category.to_string(), found, paused: false }))
}
