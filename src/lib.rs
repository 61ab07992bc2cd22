pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use crate::config::LifecycleConfig;
use crate::services::lifecycle::LifecycleCoordinator;
use crate::services::pdf::PdfService;
use axum::{
    Router,
    http::HeaderValue,
    middleware::from_fn,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::upload::upload_files,
        api::handlers::transforms::merge_pdfs,
        api::handlers::transforms::compress_pdf,
        api::handlers::transforms::reorder_pages,
        api::handlers::download::download_file,
        api::handlers::cleanup::cleanup_expired,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::upload::UploadedFile,
            api::handlers::upload::UploadResponse,
            api::handlers::transforms::MergeRequest,
            api::handlers::transforms::CompressRequest,
            api::handlers::transforms::ReorderRequest,
            api::handlers::cleanup::CleanupResponse,
            api::handlers::health::HealthResponse,
            services::pdf::CompressionLevel,
            models::PublicHandle,
            models::ProcessedFile,
            models::Operation,
            models::FileStatus,
        )
    ),
    tags(
        (name = "files", description = "Upload and download endpoints"),
        (name = "transforms", description = "Document transform endpoints"),
        (name = "system", description = "Maintenance and health")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub lifecycle: LifecycleCoordinator,
    pub pdf: Arc<PdfService>,
    pub config: LifecycleConfig,
}

impl AppState {
    pub fn new(lifecycle: LifecycleCoordinator, config: LifecycleConfig) -> Self {
        Self {
            lifecycle,
            pdf: Arc::new(PdfService::new(config.temp_dir.clone())),
            config,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    let upload_limit = state.config.max_file_size * state.config.max_files_per_upload
        + 10 * 1024 * 1024; // multipart overhead

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route(
            "/api/upload",
            post(api::handlers::upload::upload_files)
                .layer(axum::extract::DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/merge", post(api::handlers::transforms::merge_pdfs))
        .route("/api/compress", post(api::handlers::transforms::compress_pdf))
        .route("/api/reorder", post(api::handlers::transforms::reorder_pages))
        .route(
            "/api/download/:filename",
            get(api::handlers::download::download_file),
        )
        .route("/api/cleanup", post(api::handlers::cleanup::cleanup_expired))
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
