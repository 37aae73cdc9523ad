use axum::{http::StatusCode, Json};
use serde_json::{json, Value};

/// Health check endpoint to verify API status
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
