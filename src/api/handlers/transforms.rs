use crate::api::error::AppError;
use crate::api::handlers::upload::resolve_upload;
use crate::models::{Metadata, Operation, PublicHandle};
use crate::services::lifecycle::{ArtifactOutput, LifecycleError};
use crate::services::pdf::{CompressionLevel, ReorderPlan, TransformOutput};
use crate::utils::validation::sanitize_filename;
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequest {
    /// Upload ids, merged in this order
    #[validate(length(min = 2, max = 10, message = "Merge takes between 2 and 10 files"))]
    pub files: Vec<String>,
    #[validate(length(min = 1, max = 255))]
    pub filename: Option<String>,
}

#[derive(Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CompressRequest {
    /// Upload id returned by `/api/upload`
    #[validate(length(min = 1, message = "File reference is required"))]
    pub file: String,
    pub level: CompressionLevel,
    #[validate(length(min = 1, max = 255))]
    pub filename: Option<String>,
}

#[derive(Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReorderRequest {
    #[validate(length(min = 1, message = "File reference is required"))]
    pub file: String,
    /// Zero-based page indices in their new order
    #[validate(length(min = 1, message = "newOrder cannot be empty"))]
    pub new_order: Vec<u32>,
    /// Absolute rotation in degrees, keyed by zero-based page index
    #[serde(default)]
    pub rotations: HashMap<u32, i64>,
    #[serde(default)]
    pub deletions: Vec<u32>,
    #[validate(length(min = 1, max = 255))]
    pub filename: Option<String>,
}

fn parse_body<T: Validate>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    let Json(req) = body.map_err(|e| AppError::Validation(e.body_text()))?;
    req.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    Ok(req)
}

fn processed_name(requested: Option<String>, default: &str) -> Result<String, AppError> {
    match requested {
        Some(name) => sanitize_filename(&name).map_err(|e| AppError::BadRequest(e.to_string())),
        None => Ok(default.to_string()),
    }
}

fn as_metadata(value: serde_json::Value) -> Option<Metadata> {
    match value {
        serde_json::Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Registers a transform output and removes the consumed uploads. A failed
/// registration leaves no record behind, so the output file is removed too.
async fn finish(
    state: &crate::AppState,
    inputs: &[PathBuf],
    original_name: String,
    processed_name: String,
    operation: Operation,
    output: TransformOutput,
    metadata: Option<Metadata>,
) -> Result<PublicHandle, AppError> {
    let output_path = output.path.clone();
    let registered = state
        .lifecycle
        .register_artifact(ArtifactOutput {
            original_name,
            processed_name,
            file_size: output.size,
            operation,
            physical_path: output.path,
            metadata,
        })
        .await;

    let handle = match registered {
        Ok(handle) => handle,
        Err(e) => {
            let _ = tokio::fs::remove_file(&output_path).await;
            return Err(e.into());
        }
    };

    for input in inputs {
        if let Err(e) = tokio::fs::remove_file(input).await {
            tracing::warn!("Error cleaning up input {}: {}", input.display(), e);
        }
    }

    Ok(handle)
}

#[utoipa::path(
    post,
    path = "/api/merge",
    request_body = MergeRequest,
    responses(
        (status = 200, description = "Merged PDF registered", body = PublicHandle),
        (status = 400, description = "Invalid request or missing input"),
        (status = 500, description = "Failed to merge PDFs")
    ),
    tag = "transforms"
)]
pub async fn merge_pdfs(
    State(state): State<crate::AppState>,
    body: Result<Json<MergeRequest>, JsonRejection>,
) -> Result<Json<PublicHandle>, AppError> {
    let req = parse_body(body)?;

    let mut inputs = Vec::with_capacity(req.files.len());
    for id in &req.files {
        inputs.push(resolve_upload(&state, id).await?);
    }
    let name = processed_name(req.filename, "merged_document.pdf")?;

    let output = state
        .pdf
        .merge(&inputs)
        .await
        .map_err(|e| LifecycleError::TransformFailure(format!("Failed to merge PDFs: {}", e)))?;

    let handle = finish(
        &state,
        &inputs,
        name.clone(),
        name,
        Operation::Merge,
        output,
        as_metadata(json!({ "inputFiles": req.files.len() })),
    )
    .await?;

    Ok(Json(handle))
}

#[utoipa::path(
    post,
    path = "/api/compress",
    request_body = CompressRequest,
    responses(
        (status = 200, description = "Compressed PDF registered", body = PublicHandle),
        (status = 400, description = "Invalid request or missing input"),
        (status = 500, description = "Failed to compress PDF")
    ),
    tag = "transforms"
)]
pub async fn compress_pdf(
    State(state): State<crate::AppState>,
    body: Result<Json<CompressRequest>, JsonRejection>,
) -> Result<Json<PublicHandle>, AppError> {
    let req = parse_body(body)?;
    let input = resolve_upload(&state, &req.file).await?;
    let name = processed_name(req.filename, "compressed_document.pdf")?;

    let output = state
        .pdf
        .compress(&input, req.level)
        .await
        .map_err(|e| LifecycleError::TransformFailure(format!("Failed to compress PDF: {}", e)))?;

    let handle = finish(
        &state,
        &[input],
        req.file,
        name,
        Operation::Compress,
        output,
        as_metadata(json!({ "level": req.level.as_str() })),
    )
    .await?;

    Ok(Json(handle))
}

#[utoipa::path(
    post,
    path = "/api/reorder",
    request_body = ReorderRequest,
    responses(
        (status = 200, description = "Reordered PDF registered", body = PublicHandle),
        (status = 400, description = "Invalid request or missing input"),
        (status = 500, description = "Failed to reorder pages")
    ),
    tag = "transforms"
)]
pub async fn reorder_pages(
    State(state): State<crate::AppState>,
    body: Result<Json<ReorderRequest>, JsonRejection>,
) -> Result<Json<PublicHandle>, AppError> {
    let req = parse_body(body)?;
    let input = resolve_upload(&state, &req.file).await?;
    let name = processed_name(req.filename, "reordered_document.pdf")?;

    let metadata = as_metadata(json!({
        "newOrder": req.new_order,
        "rotations": req.rotations,
        "deletions": req.deletions,
    }));

    let plan = ReorderPlan {
        new_order: req.new_order,
        rotations: req.rotations,
        deletions: req.deletions,
    };

    let output = state
        .pdf
        .reorder(&input, plan)
        .await
        .map_err(|e| LifecycleError::TransformFailure(format!("Failed to reorder pages: {}", e)))?;

    let handle = finish(
        &state,
        &[input],
        req.file,
        name,
        Operation::Reorder,
        output,
        metadata,
    )
    .await?;

    Ok(Json(handle))
}
