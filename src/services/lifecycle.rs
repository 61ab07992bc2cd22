//! Processed-file lifecycle: registration, download resolution, reclamation.

use crate::config::LifecycleConfig;
use crate::models::{FileStatus, Metadata, Operation, ProcessedFileDraft, PublicHandle};
use crate::services::artifact_store::ArtifactStore;
use crate::services::storage::StorageService;
use crate::utils::in_flight::{DownloadLease, InFlightDownloads};
use crate::utils::validation::validate_storage_key;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncRead;
use tokio::task::JoinHandle;

pub const DOWNLOAD_ROUTE_PREFIX: &str = "/api/download/";

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("File not found or expired")]
    NotFound,

    #[error("Transform failed: {0}")]
    TransformFailure(String),

    #[error("Artifact store error: {0}")]
    Store(#[from] anyhow::Error),
}

/// What a transform reports once its output file is on disk
#[derive(Debug, Clone)]
pub struct ArtifactOutput {
    pub original_name: String,
    pub processed_name: String,
    pub file_size: u64,
    pub operation: Operation,
    pub physical_path: PathBuf,
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Clone)]
pub struct ResolvedDownload {
    pub record_id: String,
    pub key: String,
    pub path: PathBuf,
    pub size: u64,
}

/// An opened artifact ready to be streamed. The lease marks the file as in
/// use until this value (or the lease taken out of it) is dropped.
pub struct DownloadStream {
    pub resolved: ResolvedDownload,
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
    pub lease: DownloadLease,
}

pub fn download_url_for(key: &str) -> String {
    format!("{}{}", DOWNLOAD_ROUTE_PREFIX, key)
}

/// Storage key referenced by a download URL (its last path segment)
pub fn key_from_download_url(download_url: &str) -> Option<&str> {
    let key = download_url
        .strip_prefix(DOWNLOAD_ROUTE_PREFIX)
        .or_else(|| download_url.rsplit('/').next())?;
    validate_storage_key(key).ok()
}

#[derive(Clone)]
pub struct LifecycleCoordinator {
    store: Arc<dyn ArtifactStore>,
    storage: Arc<dyn StorageService>,
    in_flight: InFlightDownloads,
    ttl: Duration,
    download_grace: Duration,
}

impl LifecycleCoordinator {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        storage: Arc<dyn StorageService>,
        config: &LifecycleConfig,
    ) -> Self {
        Self {
            store,
            storage,
            in_flight: InFlightDownloads::new(),
            ttl: config.artifact_ttl,
            download_grace: config.download_grace,
        }
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    /// Records a finished transform output and hands back its public handle.
    ///
    /// The record is fully written before this returns, so any later lookup
    /// through the handle observes it.
    pub async fn register_artifact(
        &self,
        output: ArtifactOutput,
    ) -> Result<PublicHandle, LifecycleError> {
        let key = output
            .physical_path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| validate_storage_key(n).ok())
            .ok_or_else(|| {
                LifecycleError::TransformFailure(format!(
                    "Output path has no usable file name: {}",
                    output.physical_path.display()
                ))
            })?;

        // Handles resolve to `<storage root>/<key>`, so the output must live there
        let stored_at = self
            .storage
            .path_for(key)
            .map_err(|e| LifecycleError::TransformFailure(e.to_string()))?;
        if stored_at != output.physical_path {
            return Err(LifecycleError::TransformFailure(format!(
                "Output {} is outside the artifact directory",
                output.physical_path.display()
            )));
        }

        let ttl = chrono::Duration::from_std(self.ttl)
            .map_err(|e| anyhow::anyhow!("Invalid artifact TTL: {}", e))?;
        let expires_at = Utc::now() + ttl;
        let download_url = download_url_for(key);

        let file = self
            .store
            .create(ProcessedFileDraft {
                original_name: output.original_name,
                processed_name: output.processed_name,
                file_size: output.file_size,
                operation: output.operation,
                status: Some(FileStatus::Completed),
                download_url: Some(download_url.clone()),
                expires_at,
                metadata: output.metadata,
            })
            .await?;

        tracing::info!(
            "📦 Registered artifact {} ({}, {} bytes) expiring at {}",
            file.id,
            file.operation,
            file.file_size,
            file.expires_at
        );

        Ok(PublicHandle {
            id: file.id,
            filename: file.processed_name,
            size: file.file_size,
            download_url,
            expires_at: file.expires_at,
        })
    }

    /// Maps a download handle back to its file.
    ///
    /// A handle resolves only while its record exists, is completed and
    /// unexpired, and the backing file is still present.
    pub async fn resolve_for_download(
        &self,
        handle: &str,
    ) -> Result<ResolvedDownload, LifecycleError> {
        let key = validate_storage_key(handle).map_err(|_| LifecycleError::NotFound)?;

        let record = self
            .store
            .find_by_download_url(&download_url_for(key))
            .await
            .map_err(|e| {
                tracing::error!("Store lookup failed for {}: {}", key, e);
                LifecycleError::NotFound
            })?
            .ok_or(LifecycleError::NotFound)?;

        if record.status != FileStatus::Completed || record.is_expired_at(Utc::now()) {
            tracing::debug!("Artifact {} is not downloadable", record.id);
            return Err(LifecycleError::NotFound);
        }

        let meta = match self.storage.get_object_metadata(key).await {
            Ok(meta) => meta,
            Err(e) => {
                tracing::warn!("Backing file for artifact {} is gone: {}", record.id, e);
                return Err(LifecycleError::NotFound);
            }
        };

        let path = self
            .storage
            .path_for(key)
            .map_err(|_| LifecycleError::NotFound)?;

        Ok(ResolvedDownload {
            record_id: record.id,
            key: key.to_string(),
            path,
            size: meta.size,
        })
    }

    /// Resolves a handle and opens it for streaming under an in-flight lease.
    pub async fn open_download(&self, handle: &str) -> Result<DownloadStream, LifecycleError> {
        let resolved = self.resolve_for_download(handle).await?;
        let lease = self.in_flight.acquire(&resolved.key);

        let reader = self
            .storage
            .get_object_stream(&resolved.key)
            .await
            .map_err(|e| {
                tracing::warn!("Failed to open artifact {}: {}", resolved.key, e);
                LifecycleError::NotFound
            })?;

        tracing::info!("📥 Serving artifact {} ({} bytes)", resolved.key, resolved.size);

        Ok(DownloadStream {
            resolved,
            reader,
            lease,
        })
    }

    /// Removes an artifact's file and record once the grace delay has passed.
    ///
    /// Fire-and-forget: failures are logged and the TTL sweep remains the
    /// backstop. Skipped while another download of the same file is running;
    /// that download schedules its own deletion when it completes.
    pub fn schedule_deferred_delete(&self, record_id: String, key: String) -> JoinHandle<()> {
        let store = self.store.clone();
        let storage = self.storage.clone();
        let in_flight = self.in_flight.clone();
        let grace = self.download_grace;

        tracing::debug!("🕒 Deleting {} in {:?}", key, grace);

        tokio::spawn(async move {
            tokio::time::sleep(grace).await;

            if in_flight.is_active(&key) {
                tracing::debug!("Deferred delete of {} skipped, download in progress", key);
                return;
            }

            if let Err(e) = storage.delete_file(&key).await {
                tracing::warn!("Error cleaning up downloaded file {}: {}", key, e);
            }
            match store.delete(&record_id).await {
                Ok(_) => tracing::info!("🗑️  Reclaimed downloaded artifact {}", record_id),
                Err(e) => tracing::warn!("Failed to remove record {}: {}", record_id, e),
            }
        })
    }

    /// Reclaims every artifact that expired before `now`.
    ///
    /// File deletion errors are logged and do not stop the batch. Failing to
    /// enumerate expired records is returned to the caller.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize, LifecycleError> {
        let expired = self.store.list_expired(now).await?;
        let mut cleaned = 0;

        for file in expired {
            let key = file.download_url.as_deref().and_then(key_from_download_url);

            if let Some(key) = key {
                if self.in_flight.is_active(key) {
                    tracing::info!("⏳ Artifact {} is being downloaded, deferring", file.id);
                    continue;
                }

                match self.storage.delete_file(key).await {
                    Ok(true) => {}
                    Ok(false) => tracing::debug!("File for artifact {} already gone", file.id),
                    Err(e) => tracing::warn!("Failed to delete file {}: {}", key, e),
                }
            }

            if let Err(e) = self.store.delete(&file.id).await {
                tracing::warn!("Failed to remove expired record {}: {}", file.id, e);
            }
            cleaned += 1;
        }

        if cleaned > 0 {
            tracing::info!("🧹 Swept {} expired artifacts", cleaned);
        }
        Ok(cleaned)
    }
}
