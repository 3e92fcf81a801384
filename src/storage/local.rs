//! Local filesystem storage backend.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::backend::{
    validate_location, validate_namespace, StorageBackend, StorageError, StorageResult,
};

/// Local filesystem storage backend.
///
/// Stores objects in a directory structure:
/// ```text
/// {base_path}/
///   {namespace...}/    # one directory per namespace segment
///     {key}
/// ```
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new local storage backend
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn namespace_path(&self, namespace: &str) -> StorageResult<PathBuf> {
        validate_namespace(namespace)?;
        Ok(self.base_path.join(namespace))
    }

    /// Get the full path for a key
    fn key_path(&self, namespace: &str, key: &str) -> StorageResult<PathBuf> {
        validate_location(namespace, key)?;
        Ok(self.base_path.join(namespace).join(key))
    }

    /// Ensure parent directory exists
    async fn ensure_parent(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

fn not_found_or_io(e: std::io::Error, namespace: &str, key: &str) -> StorageError {
    if e.kind() == std::io::ErrorKind::NotFound {
        StorageError::NotFound(format!("{}/{}", namespace, key))
    } else {
        StorageError::Io(e)
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Bytes> {
        let path = self.key_path(namespace, key)?;
        let data = fs::read(&path)
            .await
            .map_err(|e| not_found_or_io(e, namespace, key))?;
        Ok(Bytes::from(data))
    }

    async fn put(&self, namespace: &str, key: &str, data: Bytes) -> StorageResult<()> {
        let path = self.key_path(namespace, key)?;
        self.ensure_parent(&path).await?;
        fs::write(&path, &data).await?;
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<()> {
        let path = self.key_path(namespace, key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()), // Already deleted
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn exists(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        let path = self.key_path(namespace, key)?;
        Ok(fs::try_exists(&path).await?)
    }

    async fn list(&self, namespace: &str, prefix: Option<&str>) -> StorageResult<Vec<String>> {
        let ns_path = self.namespace_path(namespace)?;
        let mut entries = match fs::read_dir(&ns_path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::Io(e)),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let key = entry.file_name().to_string_lossy().into_owned();
            if prefix.is_some_and(|p| !key.starts_with(p)) {
                continue;
            }
            keys.push(key);
        }

        Ok(keys)
    }

    async fn delete_namespace(&self, namespace: &str) -> StorageResult<()> {
        let ns_path = self.namespace_path(namespace)?;
        match fs::remove_dir_all(&ns_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}
