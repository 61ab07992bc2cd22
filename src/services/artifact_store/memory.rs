use super::{ArtifactStore, new_record_id};
use crate::models::{ProcessedFile, ProcessedFileDraft, ProcessedFileUpdate};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-lifetime store guarded by a single lock.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    files: RwLock<HashMap<String, ProcessedFile>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn create(&self, draft: ProcessedFileDraft) -> Result<ProcessedFile> {
        let file = ProcessedFile {
            id: new_record_id(),
            original_name: draft.original_name,
            processed_name: draft.processed_name,
            file_size: draft.file_size,
            operation: draft.operation,
            status: draft.status.unwrap_or_default(),
            download_url: draft.download_url,
            expires_at: draft.expires_at,
            metadata: draft.metadata,
            created_at: Utc::now(),
        };

        self.files
            .write()
            .await
            .insert(file.id.clone(), file.clone());
        Ok(file)
    }

    async fn get(&self, id: &str) -> Result<Option<ProcessedFile>> {
        Ok(self.files.read().await.get(id).cloned())
    }

    async fn update(
        &self,
        id: &str,
        updates: ProcessedFileUpdate,
    ) -> Result<Option<ProcessedFile>> {
        let mut files = self.files.write().await;
        Ok(files.get_mut(id).map(|file| {
            updates.apply_to(file);
            file.clone()
        }))
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.files.write().await.remove(id).is_some())
    }

    async fn list_expired(&self, as_of: DateTime<Utc>) -> Result<Vec<ProcessedFile>> {
        Ok(self
            .files
            .read()
            .await
            .values()
            .filter(|f| f.is_expired_at(as_of))
            .cloned()
            .collect())
    }

    async fn find_by_download_url(&self, download_url: &str) -> Result<Option<ProcessedFile>> {
        Ok(self
            .files
            .read()
            .await
            .values()
            .find(|f| f.download_url.as_deref() == Some(download_url))
            .cloned())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.files.read().await.len())
    }
}
