//! Page file uploads.
//!
//! Every chapter gets its own bucket, `manga/{manga_id}/chapter/{chapter_id}`,
//! and each page is stored under the hex SHA-256 of its bytes.

use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::archive::file_extension;
use crate::models::{FileInfo, UploadFile};
use crate::storage::{StorageBackend, StorageResult};

/// Mount point of the file-serving route
pub const FILES_ROUTE: &str = "/files";

#[async_trait]
pub trait PageUploader: Send + Sync {
    async fn upload_page(
        &self,
        manga_id: Uuid,
        chapter_id: Uuid,
        file: UploadFile,
    ) -> StorageResult<FileInfo>;

    async fn delete_page(&self, manga_id: Uuid, chapter_id: Uuid, file: &FileInfo)
        -> StorageResult<()>;

    /// Remove every file stored for a chapter
    async fn delete_chapter(&self, manga_id: Uuid, chapter_id: Uuid) -> StorageResult<()>;
}

pub fn chapter_bucket(manga_id: Uuid, chapter_id: Uuid) -> String {
    format!("manga/{}/chapter/{}", manga_id, chapter_id)
}

pub struct Uploader {
    storage: Arc<dyn StorageBackend>,
    public_base_url: String,
}

impl Uploader {
    pub fn new(storage: Arc<dyn StorageBackend>, public_base_url: impl Into<String>) -> Self {
        let public_base_url = public_base_url.into().trim_end_matches('/').to_string();
        Self {
            storage,
            public_base_url,
        }
    }

    fn url_for(&self, bucket: &str, key: &str) -> String {
        format!("{}{}/{}/{}", self.public_base_url, FILES_ROUTE, bucket, key)
    }
}

#[async_trait]
impl PageUploader for Uploader {
    async fn upload_page(
        &self,
        manga_id: Uuid,
        chapter_id: Uuid,
        file: UploadFile,
    ) -> StorageResult<FileInfo> {
        let bucket = chapter_bucket(manga_id, chapter_id);
        let id = hex::encode(Sha256::digest(&file.data));
        let extension = file_extension(&file.filename).to_string();
        let key = format!("{}{}", id, extension);

        // Keys are content hashes, so an existing object already holds these bytes
        if self.storage.exists(&bucket, &key).await? {
            tracing::debug!("{} already stored as {}/{}", file.filename, bucket, key);
        } else {
            self.storage.put(&bucket, &key, file.data).await?;
            tracing::debug!("Stored {} as {}/{}", file.filename, bucket, key);
        }

        Ok(FileInfo {
            url: self.url_for(&bucket, &key),
            id,
            extension,
        })
    }

    async fn delete_page(
        &self,
        manga_id: Uuid,
        chapter_id: Uuid,
        file: &FileInfo,
    ) -> StorageResult<()> {
        let bucket = chapter_bucket(manga_id, chapter_id);
        self.storage.delete(&bucket, &file.key()).await
    }

    async fn delete_chapter(&self, manga_id: Uuid, chapter_id: Uuid) -> StorageResult<()> {
        self.storage
            .delete_namespace(&chapter_bucket(manga_id, chapter_id))
            .await
    }
}
