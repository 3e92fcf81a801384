//! Storage configuration.

use std::path::PathBuf;
use std::sync::Arc;

use super::{LocalStorage, MemoryStorage, S3Config, S3Storage, StorageBackend, StorageResult};

/// Storage backend type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageType {
    /// Local filesystem storage
    Local { path: PathBuf },
    /// S3-compatible storage (AWS S3, MinIO, R2, etc.)
    S3(S3Config),
    /// Process memory, lost on exit
    Memory,
}

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Storage backend type
    pub storage_type: StorageType,
}

impl StorageConfig {
    /// Create config for local storage at the given path
    pub fn local(path: PathBuf) -> Self {
        Self {
            storage_type: StorageType::Local { path },
        }
    }

    pub fn memory() -> Self {
        Self {
            storage_type: StorageType::Memory,
        }
    }

    /// Build a storage backend from this config
    pub async fn build(&self) -> StorageResult<Arc<dyn StorageBackend>> {
        Ok(match &self.storage_type {
            StorageType::Local { path } => {
                tokio::fs::create_dir_all(path).await?;
                Arc::new(LocalStorage::new(path.clone()))
            }
            StorageType::S3(config) => Arc::new(S3Storage::new(config.clone()).await),
            StorageType::Memory => Arc::new(MemoryStorage::new()),
        })
    }
}
