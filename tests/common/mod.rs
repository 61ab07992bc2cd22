#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response},
};
use http_body_util::BodyExt;
use lopdf::{Dictionary, Document, Object};
use pdf_toolbox_backend::config::LifecycleConfig;
use pdf_toolbox_backend::services::artifact_store::{ArtifactStore, MemoryArtifactStore};
use pdf_toolbox_backend::services::lifecycle::LifecycleCoordinator;
use pdf_toolbox_backend::services::storage::LocalStorageService;
use pdf_toolbox_backend::{AppState, create_app};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

pub struct TestApp {
    pub dir: TempDir,
    pub app: Router,
    pub state: AppState,
    pub store: Arc<dyn ArtifactStore>,
}

pub async fn setup_app(ttl: Duration) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let config = LifecycleConfig {
        artifact_ttl: ttl,
        download_grace: Duration::from_millis(100),
        temp_dir: dir.path().to_path_buf(),
        ..LifecycleConfig::development()
    };
    tokio::fs::create_dir_all(config.uploads_dir()).await.unwrap();

    let store: Arc<dyn ArtifactStore> = Arc::new(MemoryArtifactStore::new());
    let lifecycle = LifecycleCoordinator::new(
        store.clone(),
        Arc::new(LocalStorageService::new(dir.path())),
        &config,
    );
    let state = AppState::new(lifecycle, config);

    TestApp {
        dir,
        app: create_app(state.clone()),
        state,
        store,
    }
}

pub fn sample_pdf(pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids = Vec::new();
    for i in 0..pages {
        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set("Parent", Object::Reference(pages_id));
        page.set(
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(200 + i as i64),
                Object::Integer(842),
            ]),
        );
        kids.push(Object::Reference(doc.add_object(page)));
    }

    let mut pages_dict = Dictionary::new();
    pages_dict.set("Type", Object::Name(b"Pages".to_vec()));
    pages_dict.set("Count", Object::Integer(pages as i64));
    pages_dict.set("Kids", Object::Array(kids));
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

pub fn multipart_request(files: &[(&str, &str, &[u8])]) -> Request<Body> {
    let boundary = "---------------------------123456789012345678901234567";
    let mut body = Vec::new();
    for (filename, content_type, content) in files {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\n\
                Content-Disposition: form-data; name=\"files\"; filename=\"{filename}\"\r\n\
                Content-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap()
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn send(app: &Router, req: Request<Body>) -> Response<Body> {
    app.clone().oneshot(req).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Uploads one PDF and returns its upload id
pub async fn upload_pdf(app: &Router, pages: usize) -> String {
    let pdf = sample_pdf(pages);
    let response = send(app, multipart_request(&[("input.pdf", "application/pdf", &pdf)])).await;
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    let json = body_json(response).await;
    json["files"][0]["id"].as_str().unwrap().to_string()
}
