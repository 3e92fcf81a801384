//! In-memory storage backend.
//!
//! Non-persistent. Used when `MANGA_STORAGE=memory` and by tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use super::backend::{
    validate_location, validate_namespace, StorageBackend, StorageError, StorageResult,
};

#[derive(Default)]
pub struct MemoryStorage {
    objects: RwLock<BTreeMap<(String, String), Bytes>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects across all namespaces
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Bytes> {
        validate_location(namespace, key)?;
        self.objects
            .read()
            .get(&(namespace.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("{}/{}", namespace, key)))
    }

    async fn put(&self, namespace: &str, key: &str, data: Bytes) -> StorageResult<()> {
        validate_location(namespace, key)?;
        self.objects
            .write()
            .insert((namespace.to_string(), key.to_string()), data);
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<()> {
        validate_location(namespace, key)?;
        self.objects
            .write()
            .remove(&(namespace.to_string(), key.to_string()));
        Ok(())
    }

    async fn exists(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        validate_location(namespace, key)?;
        Ok(self
            .objects
            .read()
            .contains_key(&(namespace.to_string(), key.to_string())))
    }

    async fn list(&self, namespace: &str, prefix: Option<&str>) -> StorageResult<Vec<String>> {
        validate_namespace(namespace)?;
        let prefix = prefix.unwrap_or("");
        Ok(self
            .objects
            .read()
            .keys()
            .filter(|(ns, key)| ns == namespace && key.starts_with(prefix))
            .map(|(_, key)| key.clone())
            .collect())
    }

    async fn delete_namespace(&self, namespace: &str) -> StorageResult<()> {
        validate_namespace(namespace)?;
        self.objects.write().retain(|(ns, _), _| ns != namespace);
        Ok(())
    }
}
