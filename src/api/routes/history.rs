use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use crate::api::models::HistoryEntry;
use crate::api::AppState;
use crate::db::Database;

type ApiError = (StatusCode, Json<Value>);

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

fn database(state: &AppState) -> Result<&Database, ApiError> {
    state.engine.database.as_ref().ok_or_else(|| {
        (StatusCode::NOT_FOUND, Json(json!({"error": "Recording is disabled, set storage.database"})))
    })
}

fn internal(e: impl std::fmt::Display) -> ApiError {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": e.to_string()})))
}

pub async fn list_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Value>, ApiError> {
    let db = database(&state)?;
    let jobs = db.list_jobs(query.limit.unwrap_or(20)).map_err(internal)?;
    Ok(Json(json!({ "jobs": jobs, "total": jobs.len() })))
}

pub async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<HistoryEntry>, ApiError> {
    let db = database(&state)?;
    let id = Uuid::parse_str(&id)
        .map_err(|_| (StatusCode::BAD_REQUEST, Json(json!({"error": "Invalid job id"}))))?;
    let job = db
        .get_job(id)
        .map_err(internal)?
        .ok_or_else(|| (StatusCode::NOT_FOUND, Json(json!({"error": "Job not found"}))))?;
    let findings = db.get_findings(id).map_err(internal)?;
    Ok(Json(HistoryEntry { job, findings }))
}
