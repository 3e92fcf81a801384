//! Chapter service: ingestion of uploaded page archives plus the read and
//! delete paths over stored chapters.

mod ingest;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::archive::ArchiveError;
use crate::clock::{Clock, IdGenerator};
use crate::models::{
    Chapter, ChapterFilter, ChapterWithPages, MangaFilter, Pagination, DEFAULT_MAX_PAGE_BYTES,
};
use crate::repository::{ChapterStore, MangaLookup, PageStore, StoreError};
use crate::storage::StorageError;
use crate::uploader::PageUploader;

/// What to do with an uploaded page file whose row could not be saved
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CleanupPolicy {
    /// Leave the file in storage
    Retain,
    /// Delete the file, best effort
    #[default]
    RemoveOrphans,
}

impl FromStr for CleanupPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "retain" => Ok(Self::Retain),
            "orphans" | "remove-orphans" => Ok(Self::RemoveOrphans),
            other => Err(format!("unknown cleanup policy: {other}")),
        }
    }
}

/// Underlying failure of an infrastructure error
#[derive(Debug, Error)]
pub enum InfraCause {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

#[derive(Debug, Error)]
pub enum ChapterError {
    #[error("manga not found")]
    MangaNotFound,

    #[error("chapter not found")]
    ChapterNotFound,

    #[error("invalid page archive: {0}")]
    ArchiveFormat(#[source] ArchiveError),

    #[error("archive contains no valid page images")]
    NoValidImages,

    #[error("page {name} is larger than {limit} bytes")]
    PageTooLarge { name: String, limit: u64 },

    #[error("{operation} failed ({context}): {source}")]
    Infrastructure {
        operation: &'static str,
        context: String,
        #[source]
        source: InfraCause,
    },
}

impl ChapterError {
    fn infra(
        operation: &'static str,
        context: impl fmt::Display,
        source: impl Into<InfraCause>,
    ) -> Self {
        ChapterError::Infrastructure {
            operation,
            context: context.to_string(),
            source: source.into(),
        }
    }

    /// Store lookups where a missing row means the chapter does not exist
    fn chapter_lookup(
        operation: &'static str,
        id: impl fmt::Display,
    ) -> impl FnOnce(StoreError) -> Self {
        move |e| match e {
            StoreError::NotFound => ChapterError::ChapterNotFound,
            other => ChapterError::infra(operation, format!("chapter {id}"), other),
        }
    }
}

pub struct ChapterService {
    mangas: Arc<dyn MangaLookup>,
    chapters: Arc<dyn ChapterStore>,
    pages: Arc<dyn PageStore>,
    uploader: Arc<dyn PageUploader>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    cleanup: CleanupPolicy,
    max_page_bytes: u64,
}

impl ChapterService {
    pub fn new(
        mangas: Arc<dyn MangaLookup>,
        chapters: Arc<dyn ChapterStore>,
        pages: Arc<dyn PageStore>,
        uploader: Arc<dyn PageUploader>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        cleanup: CleanupPolicy,
    ) -> Self {
        Self {
            mangas,
            chapters,
            pages,
            uploader,
            clock,
            ids,
            cleanup,
            max_page_bytes: DEFAULT_MAX_PAGE_BYTES,
        }
    }

    /// Cap on the decompressed size of a single page
    pub fn with_max_page_bytes(mut self, max_page_bytes: u64) -> Self {
        self.max_page_bytes = max_page_bytes;
        self
    }

    async fn ensure_manga(&self, manga_id: Uuid) -> Result<(), ChapterError> {
        match self.mangas.get_one(MangaFilter::by_id(manga_id)).await {
            Ok(_) => Ok(()),
            Err(StoreError::NotFound) => Err(ChapterError::MangaNotFound),
            Err(e) => Err(ChapterError::infra("look up manga", format!("manga {manga_id}"), e)),
        }
    }

    async fn with_pages(&self, chapter: Chapter) -> Result<ChapterWithPages, ChapterError> {
        let pages = self
            .pages
            .get_all_by_chapter(chapter.id)
            .await
            .map_err(|e| ChapterError::infra("list pages", format!("chapter {}", chapter.id), e))?;
        Ok(ChapterWithPages { chapter, pages })
    }

    /// A chapter and its pages in reading order
    pub async fn get_chapter(&self, id: Uuid) -> Result<ChapterWithPages, ChapterError> {
        let chapter = self
            .chapters
            .get_by_id(id)
            .await
            .map_err(ChapterError::chapter_lookup("get chapter", id))?;
        self.with_pages(chapter).await
    }

    /// One page of a manga's chapters, newest first, with the total count
    pub async fn list_chapters(
        &self,
        manga_id: Uuid,
        pagination: Pagination,
    ) -> Result<(Vec<Chapter>, u64), ChapterError> {
        self.ensure_manga(manga_id).await?;
        self.chapters
            .get_all_by_manga(pagination.to_db(), manga_id)
            .await
            .map_err(|e| ChapterError::infra("list chapters", format!("manga {manga_id}"), e))
    }

    pub async fn get_chapter_by_number(
        &self,
        filter: ChapterFilter,
    ) -> Result<ChapterWithPages, ChapterError> {
        let context = format!(
            "manga {} number {} volume {}",
            filter.manga_id, filter.number, filter.volume
        );
        let chapter = self
            .chapters
            .get_by_number(filter)
            .await
            .map_err(|e| match e {
                StoreError::NotFound => ChapterError::ChapterNotFound,
                other => ChapterError::infra("get chapter by number", context, other),
            })?;
        self.with_pages(chapter).await
    }

    /// Number of chapters uploaded for a manga
    pub async fn count_chapters(&self, manga_id: Uuid) -> Result<u64, ChapterError> {
        self.ensure_manga(manga_id).await?;
        self.chapters
            .count_by_manga(manga_id)
            .await
            .map_err(|e| ChapterError::infra("count chapters", format!("manga {manga_id}"), e))
    }

    /// Remove a chapter: its page and chapter rows together, then its files.
    ///
    /// File removal is best effort; rows are already gone when it runs.
    pub async fn delete_chapter(&self, id: Uuid) -> Result<(), ChapterError> {
        let chapter = self
            .chapters
            .get_by_id(id)
            .await
            .map_err(ChapterError::chapter_lookup("get chapter", id))?;

        let removed = self
            .chapters
            .delete_with_pages(id)
            .await
            .map_err(ChapterError::chapter_lookup("delete chapter", id))?;

        if let Err(e) = self.uploader.delete_chapter(chapter.manga_id, id).await {
            tracing::warn!("Failed to remove files of deleted chapter {}: {}", id, e);
        }

        tracing::info!("Deleted chapter {} ({} pages)", id, removed);
        Ok(())
    }
}
