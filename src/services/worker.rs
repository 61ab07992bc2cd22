use crate::services::lifecycle::LifecycleCoordinator;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};

/// Periodic trigger for the expiry sweep. The coordinator owns no timer;
/// this worker is the in-process scheduler that drives it.
pub struct BackgroundWorker {
    coordinator: LifecycleCoordinator,
    period: Duration,
    uploads_dir: PathBuf,
    upload_max_age: Duration,
    shutdown: watch::Receiver<bool>,
}

impl BackgroundWorker {
    pub fn new(
        coordinator: LifecycleCoordinator,
        period: Duration,
        uploads_dir: PathBuf,
        upload_max_age: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            coordinator,
            period,
            uploads_dir,
            upload_max_age,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!("🚀 Background worker started (sweep every {:?})", self.period);

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    tracing::info!("🛑 Background worker shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.perform_cleanup().await;
                }
            }
        }
    }

    async fn perform_cleanup(&self) {
        tracing::debug!("🧹 Running background cleanup tasks...");

        // 1. Expired artifacts
        match self.coordinator.sweep_expired(Utc::now()).await {
            Ok(cleaned) => tracing::debug!("Sweep reclaimed {} artifacts", cleaned),
            Err(e) => tracing::error!("❌ Expiry sweep failed: {}", e),
        }

        // 2. Uploads that were never consumed by a transform
        match purge_stale_uploads(&self.uploads_dir, self.upload_max_age).await {
            Ok(0) => {}
            Ok(n) => tracing::info!("🧹 Removed {} abandoned uploads", n),
            Err(e) => tracing::warn!("Failed to scan uploads directory: {}", e),
        }
    }
}

/// Deletes upload files last modified more than `max_age` ago.
pub async fn purge_stale_uploads(dir: &Path, max_age: Duration) -> anyhow::Result<usize> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut removed = 0;

    while let Some(entry) = entries.next_entry().await? {
        let Ok(meta) = entry.metadata().await else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }

        let age = meta
            .modified()
            .ok()
            .and_then(|m| SystemTime::now().duration_since(m).ok())
            .unwrap_or_default();

        if age > max_age {
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!("Failed to remove upload {:?}: {}", entry.path(), e),
            }
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LifecycleConfig;
    use crate::models::Operation;
    use crate::services::artifact_store::MemoryArtifactStore;
    use crate::services::lifecycle::ArtifactOutput;
    use crate::services::storage::LocalStorageService;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_worker_sweeps_expired_artifacts_and_stops_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = dir.path().join("uploads");
        tokio::fs::create_dir_all(&uploads).await.unwrap();

        let config = LifecycleConfig {
            artifact_ttl: Duration::from_millis(1),
            temp_dir: dir.path().to_path_buf(),
            ..LifecycleConfig::default()
        };
        let coordinator = LifecycleCoordinator::new(
            Arc::new(MemoryArtifactStore::new()),
            Arc::new(LocalStorageService::new(dir.path())),
            &config,
        );

        let path = dir.path().join("compressed_w.pdf");
        tokio::fs::write(&path, b"data").await.unwrap();
        coordinator
            .register_artifact(ArtifactOutput {
                original_name: "in.pdf".to_string(),
                processed_name: "out.pdf".to_string(),
                file_size: 4,
                operation: Operation::Compress,
                physical_path: path.clone(),
                metadata: None,
            })
            .await
            .unwrap();

        let (tx, rx) = watch::channel(false);
        let worker = BackgroundWorker::new(
            coordinator.clone(),
            Duration::from_millis(20),
            uploads,
            Duration::from_secs(3600),
            rx,
        );
        let handle = tokio::spawn(worker.run());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(coordinator.store().count().await.unwrap(), 0);
        assert!(!path.exists());

        tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_purge_stale_uploads_respects_age() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("fresh"), b"x").await.unwrap();

        assert_eq!(
            purge_stale_uploads(dir.path(), Duration::from_secs(3600))
                .await
                .unwrap(),
            0
        );

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(
            purge_stale_uploads(dir.path(), Duration::from_millis(1))
                .await
                .unwrap(),
            1
        );
        assert!(!dir.path().join("fresh").exists());
    }
}
