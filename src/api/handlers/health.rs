use crate::AppState;
use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub store: String,
    pub storage: String,
    pub artifacts: Option<usize>,
    pub version: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "System health status", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let artifacts = state.lifecycle.store().count().await.ok();
    let store_status = if artifacts.is_some() {
        "connected"
    } else {
        "disconnected"
    };

    let storage_status = if tokio::fs::metadata(&state.config.temp_dir).await.is_ok() {
        "available"
    } else {
        "unavailable"
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        store: store_status.to_string(),
        storage: storage_status.to_string(),
        artifacts,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
