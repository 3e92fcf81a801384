//! The ingestion pipeline behind `ChapterService::create_chapter`.
//!
//! Steps, in order:
//! 1. the manga must exist
//! 2. the archive must parse
//! 3. at least one entry must be a page image, none over the page size limit
//! 4. the chapter row is written with the valid page count
//! 5. pages are read, uploaded and recorded one at a time in numeric order
//!
//! Nothing is rolled back. A failure in step 5 leaves the chapter row and
//! every page recorded before it; `page_count` keeps the archive's count.

use std::collections::HashSet;
use std::fmt;

use bytes::Bytes;
use chrono::SubsecRound;
use uuid::Uuid;

use super::{ChapterError, ChapterService, CleanupPolicy};
use crate::archive::{
    is_valid_page, probe_dimensions, sort_numerically, ArchiveError, PageArchive,
};
use crate::models::{Chapter, CreateChapter, FileInfo, Page, UploadFile};

/// How far an ingestion got
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IngestStage {
    Validating,
    ArchiveOpened,
    ChapterPersisted,
    /// Working on the n-th valid page (1-based)
    UploadingPage(u32),
    Complete,
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestStage::Validating => write!(f, "validating"),
            IngestStage::ArchiveOpened => write!(f, "archive opened"),
            IngestStage::ChapterPersisted => write!(f, "chapter persisted"),
            IngestStage::UploadingPage(n) => write!(f, "uploading page {}", n),
            IngestStage::Complete => write!(f, "complete"),
        }
    }
}

impl ChapterService {
    /// Create a chapter from an uploaded ZIP of page images.
    pub async fn create_chapter(&self, input: CreateChapter) -> Result<Chapter, ChapterError> {
        let manga_id = input.manga_id;
        let mut stage = IngestStage::Validating;

        let result = self.ingest(input, &mut stage).await;
        match &result {
            Ok(chapter) => tracing::info!(
                "Ingested chapter {} of manga {} ({} pages)",
                chapter.id,
                manga_id,
                chapter.page_count
            ),
            Err(e @ ChapterError::Infrastructure { .. }) => {
                tracing::error!("Chapter ingestion for manga {} failed at {}: {}", manga_id, stage, e)
            }
            Err(e) => {
                tracing::warn!("Chapter ingestion for manga {} rejected at {}: {}", manga_id, stage, e)
            }
        }
        result
    }

    async fn ingest(
        &self,
        input: CreateChapter,
        stage: &mut IngestStage,
    ) -> Result<Chapter, ChapterError> {
        self.ensure_manga(input.manga_id).await?;

        let mut archive = PageArchive::read(input.archive, self.max_page_bytes)
            .map_err(ChapterError::ArchiveFormat)?;
        *stage = IngestStage::ArchiveOpened;

        let valid = archive
            .entries()
            .iter()
            .filter(|e| is_valid_page(&e.name))
            .count();
        if valid == 0 {
            return Err(ChapterError::NoValidImages);
        }

        // Declared sizes are checked up front; the read below enforces the
        // same limit on headers that understate.
        let limit = archive.max_entry_bytes();
        if let Some(entry) = archive
            .entries()
            .iter()
            .find(|e| is_valid_page(&e.name) && e.size > limit)
        {
            return Err(ChapterError::PageTooLarge {
                name: entry.name.clone(),
                limit,
            });
        }

        let mut entries = archive.entries().to_vec();
        sort_numerically(&mut entries);

        // Rows keep whole seconds
        let now = self.clock.now().trunc_subsecs(0);
        let chapter = Chapter {
            id: self.ids.new_id(),
            manga_id: input.manga_id,
            title: input.title,
            number: input.number,
            volume: input.volume,
            page_count: u32::try_from(valid).unwrap_or(u32::MAX),
            uploader_id: input.uploader_id,
            uploaded_at: now,
        };
        self.chapters.create(&chapter).await.map_err(|e| {
            ChapterError::infra("persist chapter", format!("manga {}", chapter.manga_id), e)
        })?;
        *stage = IngestStage::ChapterPersisted;

        // Keys already backing a recorded page; cleanup must not touch these
        let mut stored_keys = HashSet::new();
        let mut sequence = 0u32;

        for entry in entries.iter().filter(|e| is_valid_page(&e.name)) {
            sequence += 1;
            *stage = IngestStage::UploadingPage(sequence);
            let context = format!("chapter {} page {} ({})", chapter.id, sequence, entry.name);

            let data = archive
                .read_entry(entry)
                .map(Bytes::from)
                .map_err(|e| match e {
                    ArchiveError::EntryTooLarge { name, limit } => {
                        ChapterError::PageTooLarge { name, limit }
                    }
                    other => ChapterError::infra("read page", &context, other),
                })?;
            let dimensions = probe_dimensions(&data);

            let file = self
                .uploader
                .upload_page(
                    chapter.manga_id,
                    chapter.id,
                    UploadFile {
                        filename: entry.file_name().to_string(),
                        data,
                    },
                )
                .await
                .map_err(|e| ChapterError::infra("upload page", &context, e))?;

            let page = Page {
                id: self.ids.new_id(),
                chapter_id: chapter.id,
                url: file.url.clone(),
                storage_key: file.key(),
                number: sequence,
                width: dimensions.map(|(w, _)| w),
                height: dimensions.map(|(_, h)| h),
                created_at: self.clock.now().trunc_subsecs(0),
            };

            if let Err(e) = self.pages.create(&page).await {
                if !stored_keys.contains(&page.storage_key) {
                    self.remove_orphan(chapter.manga_id, chapter.id, &file).await;
                }
                return Err(ChapterError::infra("persist page", &context, e));
            }

            tracing::debug!("Stored page {} of chapter {}", sequence, chapter.id);
            stored_keys.insert(page.storage_key);
        }

        *stage = IngestStage::Complete;
        Ok(chapter)
    }

    async fn remove_orphan(&self, manga_id: Uuid, chapter_id: Uuid, file: &FileInfo) {
        if self.cleanup == CleanupPolicy::Retain {
            tracing::warn!("Leaving unreferenced page file {} in chapter {}", file.key(), chapter_id);
            return;
        }
        if let Err(e) = self.uploader.delete_page(manga_id, chapter_id, file).await {
            tracing::warn!("Failed to remove unreferenced page file {}: {}", file.key(), e);
        }
    }
}
