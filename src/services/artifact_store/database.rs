use super::{ArtifactStore, new_record_id};
use crate::entities::{prelude::*, *};
use crate::models::{
    FileStatus, Metadata, Operation, ProcessedFile, ProcessedFileDraft, ProcessedFileUpdate,
};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set,
};

/// Store backed by the `processed_files` table
pub struct DatabaseArtifactStore {
    db: DatabaseConnection,
}

impl DatabaseArtifactStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

impl TryFrom<processed_files::Model> for ProcessedFile {
    type Error = anyhow::Error;

    fn try_from(model: processed_files::Model) -> Result<Self> {
        let operation = Operation::parse(&model.operation)
            .ok_or_else(|| anyhow!("Unknown operation tag: {}", model.operation))?;
        let status = FileStatus::parse(&model.status)
            .ok_or_else(|| anyhow!("Unknown status: {}", model.status))?;
        let metadata: Option<Metadata> = model.metadata.and_then(|v| match v {
            serde_json::Value::Object(map) => Some(map),
            _ => None,
        });

        Ok(ProcessedFile {
            id: model.id,
            original_name: model.original_name,
            processed_name: model.processed_name,
            file_size: u64::try_from(model.file_size).unwrap_or(0),
            operation,
            status,
            download_url: model.download_url,
            expires_at: model.expires_at,
            metadata,
            created_at: model.created_at,
        })
    }
}

#[async_trait]
impl ArtifactStore for DatabaseArtifactStore {
    async fn create(&self, draft: ProcessedFileDraft) -> Result<ProcessedFile> {
        let model = processed_files::ActiveModel {
            id: Set(new_record_id()),
            original_name: Set(draft.original_name),
            processed_name: Set(draft.processed_name),
            file_size: Set(i64::try_from(draft.file_size).unwrap_or(i64::MAX)),
            operation: Set(draft.operation.as_str().to_string()),
            status: Set(draft.status.unwrap_or_default().as_str().to_string()),
            download_url: Set(draft.download_url),
            expires_at: Set(draft.expires_at),
            metadata: Set(draft.metadata.map(serde_json::Value::Object)),
            created_at: Set(Utc::now()),
        }
        .insert(&self.db)
        .await?;

        model.try_into()
    }

    async fn get(&self, id: &str) -> Result<Option<ProcessedFile>> {
        ProcessedFiles::find_by_id(id.to_string())
            .one(&self.db)
            .await?
            .map(ProcessedFile::try_from)
            .transpose()
    }

    async fn update(
        &self,
        id: &str,
        updates: ProcessedFileUpdate,
    ) -> Result<Option<ProcessedFile>> {
        let Some(existing) = ProcessedFiles::find_by_id(id.to_string())
            .one(&self.db)
            .await?
        else {
            return Ok(None);
        };

        let mut active: processed_files::ActiveModel = existing.into();
        if let Some(v) = updates.original_name {
            active.original_name = Set(v);
        }
        if let Some(v) = updates.processed_name {
            active.processed_name = Set(v);
        }
        if let Some(v) = updates.status {
            active.status = Set(v.as_str().to_string());
        }
        if let Some(v) = updates.download_url {
            active.download_url = Set(Some(v));
        }
        if let Some(v) = updates.metadata {
            active.metadata = Set(Some(serde_json::Value::Object(v)));
        }

        let updated = active.update(&self.db).await?;
        Ok(Some(updated.try_into()?))
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let res = ProcessedFiles::delete_by_id(id.to_string())
            .exec(&self.db)
            .await?;
        Ok(res.rows_affected > 0)
    }

    async fn list_expired(&self, as_of: DateTime<Utc>) -> Result<Vec<ProcessedFile>> {
        ProcessedFiles::find()
            .filter(processed_files::Column::ExpiresAt.lt(as_of))
            .all(&self.db)
            .await?
            .into_iter()
            .map(ProcessedFile::try_from)
            .collect()
    }

    async fn find_by_download_url(&self, download_url: &str) -> Result<Option<ProcessedFile>> {
        ProcessedFiles::find()
            .filter(processed_files::Column::DownloadUrl.eq(download_url))
            .one(&self.db)
            .await?
            .map(ProcessedFile::try_from)
            .transpose()
    }

    async fn count(&self) -> Result<usize> {
        let n = ProcessedFiles::find().count(&self.db).await?;
        Ok(n as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database;
    use chrono::Duration;
    use sea_orm::Database;
    use serde_json::json;

    async fn setup_store() -> DatabaseArtifactStore {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        database::run_migrations(&db).await.unwrap();
        DatabaseArtifactStore::new(db)
    }

    fn draft(expires_at: DateTime<Utc>) -> ProcessedFileDraft {
        let mut metadata = Metadata::new();
        metadata.insert("level".to_string(), json!("strong"));
        ProcessedFileDraft {
            original_name: "scan.pdf".to_string(),
            processed_name: "compressed_document.pdf".to_string(),
            file_size: 512,
            operation: Operation::Compress,
            status: Some(FileStatus::Completed),
            download_url: Some(format!("/api/download/compressed_{}.pdf", new_record_id())),
            expires_at,
            metadata: Some(metadata),
        }
    }

    #[tokio::test]
    async fn test_create_get_and_metadata_passthrough() {
        let store = setup_store().await;
        let created = store
            .create(draft(Utc::now() + Duration::minutes(15)))
            .await
            .unwrap();

        let fetched = store.get(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.operation, Operation::Compress);
        assert_eq!(fetched.status, FileStatus::Completed);
        assert_eq!(
            fetched.metadata.as_ref().and_then(|m| m.get("level")),
            Some(&json!("strong"))
        );

        let by_url = store
            .find_by_download_url(created.download_url.as_deref().unwrap())
            .await
            .unwrap();
        assert_eq!(by_url.map(|f| f.id), Some(created.id));
    }

    #[tokio::test]
    async fn test_delete_and_list_expired() {
        let store = setup_store().await;
        let now = Utc::now();
        let stale = store.create(draft(now - Duration::minutes(1))).await.unwrap();
        let fresh = store.create(draft(now + Duration::minutes(15))).await.unwrap();

        let expired = store.list_expired(now).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, stale.id);

        assert!(store.delete(&stale.id).await.unwrap());
        assert!(!store.delete(&stale.id).await.unwrap());
        assert!(store.get(&stale.id).await.unwrap().is_none());
        assert_eq!(store.count().await.unwrap(), 1);

        let updated = store
            .update(
                &fresh.id,
                ProcessedFileUpdate {
                    processed_name: Some("renamed.pdf".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.processed_name, "renamed.pdf");
        assert_eq!(updated.expires_at, fresh.expires_at);
    }
}
