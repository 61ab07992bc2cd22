use crate::api::error::AppError;
use crate::services::lifecycle::DownloadStream;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::Response,
};
use bytes::Bytes;
use futures::StreamExt;
use tokio_util::io::ReaderStream;

#[utoipa::path(
    get,
    path = "/api/download/{filename}",
    params(
        ("filename" = String, Path, description = "Download handle from a transform response")
    ),
    responses(
        (status = 200, description = "Artifact byte stream"),
        (status = 404, description = "File not found or expired")
    ),
    tag = "files"
)]
pub async fn download_file(
    State(state): State<crate::AppState>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    let DownloadStream {
        resolved,
        reader,
        lease,
    } = state.lifecycle.open_download(&filename).await?;

    let content_disposition = format!("attachment; filename=\"{}\"", resolved.key);
    let size = resolved.size;
    let lifecycle = state.lifecycle.clone();

    // Deletion is scheduled only once the last byte has been handed to the
    // client; an aborted download drops this stream before reaching that point.
    let body = async_stream::stream! {
        let mut chunks = ReaderStream::new(reader);
        while let Some(chunk) = chunks.next().await {
            match chunk {
                Ok(bytes) => yield Ok::<Bytes, std::io::Error>(bytes),
                Err(e) => {
                    tracing::warn!("Download of {} interrupted: {}", resolved.key, e);
                    yield Err(e);
                    return;
                }
            }
        }
        drop(lease);
        lifecycle.schedule_deferred_delete(resolved.record_id, resolved.key);
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime::APPLICATION_OCTET_STREAM.as_ref())
        .header(header::CONTENT_DISPOSITION, content_disposition)
        .header(header::CONTENT_LENGTH, size)
        .body(Body::from_stream(body))
        .map_err(|e| AppError::Internal(format!("Failed to build download response: {}", e)))
}
