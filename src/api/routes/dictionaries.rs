use axum::{extract::State, Json};
use serde_json::{json, Value};
use crate::api::AppState;

pub async fn list_dictionaries(State(state): State<AppState>) -> Json<Value> {
    let dictionaries = state.engine.controller.dictionaries().list().await;
    Json(json!({ "dictionaries": dictionaries, "total": dictionaries.len() }))
}
