//! Keyed storage of processed-file records.
//!
//! The store knows nothing about bytes on disk: it only tracks records.
//! Expiry is recorded here but enforced by the lifecycle coordinator, since
//! "expired but not yet swept" is a legitimate state for a record.

mod database;
mod memory;

pub use database::DatabaseArtifactStore;
pub use memory::MemoryArtifactStore;

use crate::models::{ProcessedFile, ProcessedFileDraft, ProcessedFileUpdate};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Inserts a new record with a fresh random id and `created_at = now`.
    async fn create(&self, draft: ProcessedFileDraft) -> Result<ProcessedFile>;

    /// Pure lookup, expiry is not checked.
    async fn get(&self, id: &str) -> Result<Option<ProcessedFile>>;

    /// Merges mutable fields into an existing record.
    async fn update(&self, id: &str, updates: ProcessedFileUpdate)
    -> Result<Option<ProcessedFile>>;

    /// Returns whether a record existed. Deleting an unknown id is not an error.
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Snapshot of every record with `expires_at < as_of`.
    async fn list_expired(&self, as_of: DateTime<Utc>) -> Result<Vec<ProcessedFile>>;

    /// Lookup by the public download reference of a record.
    async fn find_by_download_url(&self, download_url: &str) -> Result<Option<ProcessedFile>>;

    async fn count(&self) -> Result<usize>;
}

pub(crate) fn new_record_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
