use crate::config::LifecycleConfig;
use crate::services::storage::LocalStorageService;
use std::sync::Arc;
use tracing::info;

/// Creates the artifact and upload directories and returns the storage service.
pub async fn setup_storage(config: &LifecycleConfig) -> anyhow::Result<Arc<LocalStorageService>> {
    let root = config.temp_dir.clone();
    let uploads = config.uploads_dir();

    tokio::fs::create_dir_all(&root).await?;
    tokio::fs::create_dir_all(&uploads).await?;

    info!(
        "🗂️  Artifact storage: {} (uploads: {})",
        root.display(),
        uploads.display()
    );

    Ok(Arc::new(LocalStorageService::new(root)))
}
