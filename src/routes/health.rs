// src/routes/health.rs

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::AppState;

pub async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "message": format!("Welcome to {}", state.config.app_name),
        "version": state.config.app_version,
    }))
}

pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}
