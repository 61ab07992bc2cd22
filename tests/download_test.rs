mod common;

use axum::http::{StatusCode, header};
use chrono::Utc;
use common::*;
use pdf_toolbox_backend::services::artifact_store::ArtifactStore;
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn test_download_unknown_handle_is_not_found() {
    let t = setup_app(Duration::from_secs(60)).await;

    let response = send(&t.app, empty_request("GET", "/api/download/missing.pdf")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert_eq!(json["error"], "File not found or expired");
}

#[tokio::test]
async fn test_compress_then_download_then_file_is_gone() {
    let t = setup_app(Duration::from_secs(60)).await;
    let upload_id = upload_pdf(&t.app, 3).await;

    let response = send(
        &t.app,
        json_request(
            "POST",
            "/api/compress",
            json!({ "file": upload_id, "level": "balanced" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let handle = body_json(response).await;
    assert_eq!(handle["filename"], "compressed_document.pdf");
    let download_url = handle["downloadUrl"].as_str().unwrap().to_string();
    assert!(download_url.starts_with("/api/download/compressed_"));
    let size = handle["size"].as_u64().unwrap();

    // The consumed upload is removed once the artifact is registered
    assert!(!t.dir.path().join("uploads").join(&upload_id).exists());

    let key = download_url.trim_start_matches("/api/download/").to_string();
    let artifact_path = t.dir.path().join(&key);
    assert!(artifact_path.exists());

    let response = send(&t.app, empty_request("GET", &download_url)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/octet-stream"
    );
    assert_eq!(
        response.headers()[header::CONTENT_LENGTH],
        size.to_string().as_str()
    );
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        format!("attachment; filename=\"{}\"", key).as_str()
    );

    let bytes = body_bytes(response).await;
    assert_eq!(bytes.len() as u64, size);
    assert!(bytes.starts_with(b"%PDF"));

    // Deletion waits for the grace delay
    assert!(artifact_path.exists());
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(!artifact_path.exists());
    assert_eq!(t.store.count().await.unwrap(), 0);

    let response = send(&t.app, empty_request("GET", &download_url)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_download_of_expired_artifact_is_not_found() {
    let t = setup_app(Duration::from_millis(50)).await;
    let upload_id = upload_pdf(&t.app, 1).await;

    let response = send(
        &t.app,
        json_request("POST", "/api/compress", json!({ "file": upload_id, "level": "strong" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let handle = body_json(response).await;
    let download_url = handle["downloadUrl"].as_str().unwrap().to_string();

    tokio::time::sleep(Duration::from_millis(100)).await;

    let response = send(&t.app, empty_request("GET", &download_url)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // The record outlives its expiry until a sweep reclaims it
    let expired = t.store.list_expired(Utc::now()).await.unwrap();
    assert_eq!(expired.len(), 1);
}

#[tokio::test]
async fn test_download_rejects_traversal_handles() {
    let t = setup_app(Duration::from_secs(60)).await;
    tokio::fs::write(t.dir.path().join("secret.pdf"), b"%PDF-1.5")
        .await
        .unwrap();

    // No record points at the file, so it must not be served
    let response = send(&t.app, empty_request("GET", "/api/download/secret.pdf")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&t.app, empty_request("GET", "/api/download/..%2Fsecret.pdf")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
