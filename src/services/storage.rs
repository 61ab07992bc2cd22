use crate::utils::validation::validate_storage_key;
use anyhow::Result;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::io::AsyncRead;

pub struct FileMetadata {
    pub size: u64,
}

/// Byte storage for artifacts, addressed by a flat key (the file's base name).
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Physical location of `key`. Fails for keys that would escape the root.
    fn path_for(&self, key: &str) -> Result<PathBuf>;
    async fn get_object_metadata(&self, key: &str) -> Result<FileMetadata>;
    async fn get_object_stream(&self, key: &str) -> Result<Box<dyn AsyncRead + Send + Unpin>>;
    /// Returns `false` when there was nothing to delete.
    async fn delete_file(&self, key: &str) -> Result<bool>;
}

/// Artifacts stored as plain files in one directory
pub struct LocalStorageService {
    root: PathBuf,
}

impl LocalStorageService {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl StorageService for LocalStorageService {
    fn path_for(&self, key: &str) -> Result<PathBuf> {
        Ok(self.root.join(validate_storage_key(key)?))
    }

    async fn get_object_metadata(&self, key: &str) -> Result<FileMetadata> {
        let meta = tokio::fs::metadata(self.path_for(key)?).await?;
        if !meta.is_file() {
            anyhow::bail!("{} is not a file", key);
        }

        Ok(FileMetadata { size: meta.len() })
    }

    async fn get_object_stream(&self, key: &str) -> Result<Box<dyn AsyncRead + Send + Unpin>> {
        let file = tokio::fs::File::open(self.path_for(key)?).await?;
        Ok(Box::new(file))
    }

    async fn delete_file(&self, key: &str) -> Result<bool> {
        match tokio::fs::remove_file(self.path_for(key)?).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
