use axum::{extract::State, response::IntoResponse, Json};
use crate::state::AppState;
use std::sync::Arc;

pub async fn health_check(State(_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
