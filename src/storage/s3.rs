//! S3-compatible storage backend (AWS S3, MinIO, R2, etc.).

use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Builder, Region},
    primitives::ByteStream,
    Client,
};
use bytes::Bytes;

use super::backend::{
    validate_location, validate_namespace, StorageBackend, StorageError, StorageResult,
};

/// S3 storage backend configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct S3Config {
    /// S3 bucket name
    pub bucket: String,
    /// Optional prefix for all keys (e.g., "uploads/")
    pub prefix: Option<String>,
    /// AWS region
    pub region: String,
    /// Custom endpoint URL (for MinIO, R2, etc.)
    pub endpoint: Option<String>,
    /// Force path-style URLs (required for MinIO)
    pub force_path_style: bool,
}

impl S3Config {
    /// Create config for AWS S3
    pub fn aws(bucket: String, region: String) -> Self {
        Self {
            bucket,
            prefix: None,
            region,
            endpoint: None,
            force_path_style: false,
        }
    }

    /// Create config for MinIO or other S3-compatible storage
    pub fn minio(bucket: String, endpoint: String) -> Self {
        Self {
            bucket,
            prefix: None,
            region: "us-east-1".to_string(), // MinIO doesn't care about region
            endpoint: Some(endpoint),
            force_path_style: true,
        }
    }

    /// Set a key prefix
    pub fn with_prefix(mut self, prefix: String) -> Self {
        self.prefix = Some(prefix);
        self
    }
}

/// S3-compatible storage backend
pub struct S3Storage {
    client: Client,
    bucket: String,
    prefix: Option<String>,
}

impl S3Storage {
    /// Create a new S3 storage backend from config
    pub async fn new(config: S3Config) -> Self {
        let mut builder = Builder::new()
            .region(Region::new(config.region))
            .force_path_style(config.force_path_style);

        if let Some(endpoint) = config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        // Load credentials from environment or use defaults
        let sdk_config = aws_config::load_from_env().await;
        if let Some(creds) = sdk_config.credentials_provider() {
            builder = builder.credentials_provider(creds);
        }

        Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket,
            prefix: config.prefix,
        }
    }

    fn namespace_prefix(&self, namespace: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}{}/", prefix, namespace),
            None => format!("{}/", namespace),
        }
    }

    /// Build the full S3 key from namespace and key
    fn full_key(&self, namespace: &str, key: &str) -> String {
        format!("{}{}", self.namespace_prefix(namespace), key)
    }
}

#[async_trait]
impl StorageBackend for S3Storage {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Bytes> {
        validate_location(namespace, key)?;
        let s3_key = self.full_key(namespace, key);

        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&s3_key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    StorageError::NotFound(format!("{}/{}", namespace, key))
                } else {
                    StorageError::Other(e.to_string())
                }
            })?;

        let data = result
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Other(e.to_string()))?;

        Ok(data.into_bytes())
    }

    async fn put(&self, namespace: &str, key: &str, data: Bytes) -> StorageResult<()> {
        validate_location(namespace, key)?;
        let s3_key = self.full_key(namespace, key);
        let content_type = mime_guess::from_path(key).first_or_octet_stream();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&s3_key)
            .content_type(content_type.essence_str())
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| StorageError::Other(e.to_string()))?;

        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<()> {
        validate_location(namespace, key)?;
        let s3_key = self.full_key(namespace, key);

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&s3_key)
            .send()
            .await
            .map_err(|e| StorageError::Other(e.to_string()))?;

        Ok(())
    }

    async fn exists(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        validate_location(namespace, key)?;
        let s3_key = self.full_key(namespace, key);

        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&s3_key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(false),
            Err(e) => Err(StorageError::Other(e.to_string())),
        }
    }

    async fn list(&self, namespace: &str, prefix: Option<&str>) -> StorageResult<Vec<String>> {
        validate_namespace(namespace)?;
        let ns_prefix = self.namespace_prefix(namespace);
        let full_prefix = format!("{}{}", ns_prefix, prefix.unwrap_or(""));

        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&full_prefix);

            if let Some(token) = &continuation_token {
                request = request.continuation_token(token);
            }

            let result = request
                .send()
                .await
                .map_err(|e| StorageError::Other(e.to_string()))?;

            for obj in result.contents.unwrap_or_default() {
                let Some(key) = obj.key else { continue };
                // Only keys directly in this namespace, not nested ones
                if let Some(stripped) = key.strip_prefix(&ns_prefix) {
                    if !stripped.contains('/') {
                        keys.push(stripped.to_string());
                    }
                }
            }

            if result.is_truncated.unwrap_or(false) {
                continuation_token = result.next_continuation_token;
            } else {
                break;
            }
        }

        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minio_config_forces_path_style() {
        let config = S3Config::minio("pages".into(), "http://localhost:9000".into())
            .with_prefix("dev/".into());
        assert!(config.force_path_style);
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.prefix.as_deref(), Some("dev/"));
    }
}
