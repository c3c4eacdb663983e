use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use crate::errors::EngineError;

impl IntoResponse for EngineError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            EngineError::Config(_) | EngineError::Parse { .. } | EngineError::Json(_) => StatusCode::BAD_REQUEST,
            EngineError::AlreadyRunning(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let kind = self.classify().error_type;

        (status, Json(json!({"error": self.to_string(), "type": kind}))).into_response()
    }
}
