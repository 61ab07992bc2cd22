use crate::api::error::AppError;
use crate::utils::validation::{validate_file_size, validate_storage_key};
use axum::{
    Json,
    extract::{Multipart, State},
};
use serde::Serialize;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Serialize, ToSchema)]
pub struct UploadedFile {
    /// Reference to pass as `file` to the transform endpoints
    pub id: String,
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub content_type: String,
    pub path: String,
}

#[derive(Serialize, ToSchema)]
pub struct UploadResponse {
    pub files: Vec<UploadedFile>,
}

/// Resolves an upload id to its path, failing when it no longer exists.
pub(crate) async fn resolve_upload(state: &crate::AppState, id: &str) -> Result<PathBuf, AppError> {
    let id = validate_storage_key(id)
        .map_err(|_| AppError::BadRequest("Input file not found".to_string()))?;
    let path = state.config.uploads_dir().join(id);

    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => Ok(path),
        _ => Err(AppError::BadRequest("Input file not found".to_string())),
    }
}

#[utoipa::path(
    post,
    path = "/api/upload",
    request_body(content = Multipart, description = "Files in the `files` field"),
    responses(
        (status = 200, description = "Files stored for processing", body = UploadResponse),
        (status = 400, description = "No acceptable files uploaded"),
        (status = 413, description = "File too large")
    ),
    tag = "files"
)]
pub async fn upload_files(
    State(state): State<crate::AppState>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut written = Vec::new();

    match receive_files(&state, multipart, &mut written).await {
        Ok(files) => Ok(Json(UploadResponse { files })),
        Err(e) => {
            // A rejected request keeps none of its files, partial or complete
            for path in &written {
                let _ = tokio::fs::remove_file(path).await;
            }
            Err(e)
        }
    }
}

/// Streams every acceptable `files` field to disk. Each created path is
/// recorded in `written` before any bytes land in it.
async fn receive_files(
    state: &crate::AppState,
    mut multipart: Multipart,
    written: &mut Vec<PathBuf>,
) -> Result<Vec<UploadedFile>, AppError> {
    let uploads_dir = state.config.uploads_dir();
    let mut uploaded = Vec::new();

    while let Some(mut field) = multipart.next_field().await.map_err(|e| {
        let err_msg = e.to_string();
        if err_msg.contains("length limit exceeded") {
            AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
        } else {
            AppError::BadRequest(err_msg)
        }
    })? {
        if field.name() != Some("files") {
            continue;
        }

        let original_name = field.file_name().unwrap_or("unnamed").to_string();
        if !state.config.is_extension_allowed(&original_name) {
            tracing::debug!("Skipping upload with disallowed extension: {}", original_name);
            continue;
        }

        if uploaded.len() >= state.config.max_files_per_upload {
            return Err(AppError::BadRequest(format!(
                "At most {} files per upload",
                state.config.max_files_per_upload
            )));
        }

        let content_type = field
            .content_type()
            .unwrap_or(mime::APPLICATION_OCTET_STREAM.as_ref())
            .to_string();
        let id = Uuid::new_v4().simple().to_string();
        let path = uploads_dir.join(&id);

        let mut out = tokio::fs::File::create(&path).await.map_err(anyhow::Error::from)?;
        written.push(path.clone());
        let mut size: usize = 0;

        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?
        {
            size += chunk.len();
            if validate_file_size(size, state.config.max_file_size).is_err() {
                return Err(AppError::PayloadTooLarge(format!(
                    "{} exceeds the {} byte limit",
                    original_name, state.config.max_file_size
                )));
            }
            out.write_all(&chunk).await.map_err(anyhow::Error::from)?;
        }
        out.flush().await.map_err(anyhow::Error::from)?;

        tracing::info!("📤 Stored upload {} ({}, {} bytes)", id, original_name, size);

        uploaded.push(UploadedFile {
            path: path.display().to_string(),
            id,
            name: original_name,
            size: size as u64,
            content_type,
        });
    }

    if uploaded.is_empty() {
        return Err(AppError::BadRequest("No files uploaded".to_string()));
    }

    Ok(uploaded)
}
