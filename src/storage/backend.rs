//! Storage backend trait definition.
//!
//! Objects are addressed by `(namespace, key)`. A namespace may contain `/`
//! and is used by the uploader as a per-chapter bucket.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Storage error types
#[derive(Debug, Error)]
pub enum StorageError {
    /// Object not found
    #[error("object not found: {0}")]
    NotFound(String),
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Other error, including rejected paths and remote failures
    #[error("storage error: {0}")]
    Other(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Storage backend trait for pluggable storage.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Get an object by namespace and key
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Bytes>;

    /// Put an object by namespace and key, replacing any existing one
    async fn put(&self, namespace: &str, key: &str, data: Bytes) -> StorageResult<()>;

    /// Delete an object. Deleting a missing object is not an error.
    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<()>;

    /// Check if an object exists
    async fn exists(&self, namespace: &str, key: &str) -> StorageResult<bool>;

    /// List all keys directly in a namespace (with optional prefix)
    async fn list(&self, namespace: &str, prefix: Option<&str>) -> StorageResult<Vec<String>>;

    /// Delete every object in a namespace
    async fn delete_namespace(&self, namespace: &str) -> StorageResult<()> {
        for key in self.list(namespace, None).await? {
            self.delete(namespace, &key).await?;
        }
        Ok(())
    }
}

/// Reject namespaces and keys that could escape the storage root.
///
/// Keys must be a single non-empty path segment. Namespaces may have several
/// segments but none may be empty, `.` or `..`.
pub fn validate_location(namespace: &str, key: &str) -> StorageResult<()> {
    validate_namespace(namespace)?;
    if !is_plain_segment(key) {
        return Err(StorageError::Other(format!("invalid key: {key:?}")));
    }
    Ok(())
}

pub fn validate_namespace(namespace: &str) -> StorageResult<()> {
    if namespace.split('/').all(is_plain_segment) {
        Ok(())
    } else {
        Err(StorageError::Other(format!("invalid namespace: {namespace:?}")))
    }
}

fn is_plain_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['/', '\\', '\0'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_location() {
        assert!(validate_location("manga/1/chapter/2", "abc.png").is_ok());
        assert!(validate_location("ns", "key").is_ok());

        assert!(validate_location("manga/../etc", "abc.png").is_err());
        assert!(validate_location("manga//x", "abc.png").is_err());
        assert!(validate_location("/abs", "abc.png").is_err());
        assert!(validate_location("ns", "..").is_err());
        assert!(validate_location("ns", "a/b").is_err());
        assert!(validate_location("ns", "").is_err());
    }
}
