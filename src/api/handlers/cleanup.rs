use crate::api::error::AppError;
use axum::{Json, extract::State};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct CleanupResponse {
    pub cleaned: usize,
}

#[utoipa::path(
    post,
    path = "/api/cleanup",
    responses(
        (status = 200, description = "Expired artifacts reclaimed", body = CleanupResponse),
        (status = 500, description = "Cleanup failed")
    ),
    tag = "system"
)]
pub async fn cleanup_expired(
    State(state): State<crate::AppState>,
) -> Result<Json<CleanupResponse>, AppError> {
    let cleaned = state.lifecycle.sweep_expired(Utc::now()).await?;
    Ok(Json(CleanupResponse { cleaned }))
}
