//! Domain types shared by the services, repositories and handlers.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Largest accepted page archive upload (20 MiB)
pub const MAX_PAGE_ARCHIVE_SIZE: usize = 20 * 1024 * 1024;

/// Largest decompressed page image (32 MiB)
pub const DEFAULT_MAX_PAGE_BYTES: u64 = 32 * 1024 * 1024;

pub const DEFAULT_PAGE_LIMIT: u64 = 20;
pub const MAX_PAGE_LIMIT: u64 = 100;

/// Catalog entry. Only looked up here, owned by the catalog service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Manga {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct MangaFilter {
    pub id: Option<Uuid>,
}

impl MangaFilter {
    pub fn by_id(id: Uuid) -> Self {
        Self { id: Some(id) }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Chapter {
    pub id: Uuid,
    pub manga_id: Uuid,
    pub title: Option<String>,
    pub number: u32,
    pub volume: u32,
    /// Valid pages counted at ingestion. Not corrected if ingestion fails part way.
    pub page_count: u32,
    pub uploader_id: Uuid,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Page {
    pub id: Uuid,
    pub chapter_id: Uuid,
    pub url: String,
    /// Object key inside the chapter's storage bucket
    #[serde(skip_serializing)]
    pub storage_key: String,
    /// 1-based position among the chapter's valid pages
    pub number: u32,
    pub height: Option<u32>,
    pub width: Option<u32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChapterWithPages {
    #[serde(flatten)]
    pub chapter: Chapter,
    pub pages: Vec<Page>,
}

/// Natural key used by "get by number"
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChapterFilter {
    pub manga_id: Uuid,
    pub number: u32,
    pub volume: u32,
}

/// Input for chapter ingestion
#[derive(Clone, Debug)]
pub struct CreateChapter {
    pub manga_id: Uuid,
    pub uploader_id: Uuid,
    pub title: Option<String>,
    pub number: u32,
    pub volume: u32,
    pub archive: Bytes,
}

/// A named blob handed to the uploader
#[derive(Clone, Debug)]
pub struct UploadFile {
    pub filename: String,
    pub data: Bytes,
}

/// Where an uploaded file landed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileInfo {
    /// Content hash (lowercase hex SHA-256)
    pub id: String,
    /// Extension including the dot, may be empty
    pub extension: String,
    pub url: String,
}

impl FileInfo {
    /// Object key inside the bucket
    pub fn key(&self) -> String {
        format!("{}{}", self.id, self.extension)
    }
}

/// Request-level pagination (1-based page)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub page_limit: u64,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum PaginationError {
    #[error("page must be at least 1")]
    InvalidPage,
    #[error("max limit is 100")]
    InvalidLimit,
    #[error("page is out of range")]
    PageOutOfRange,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl Pagination {
    pub fn new(page: u64, page_limit: u64) -> Result<Self, PaginationError> {
        if page == 0 {
            return Err(PaginationError::InvalidPage);
        }
        if page_limit == 0 || page_limit > MAX_PAGE_LIMIT {
            return Err(PaginationError::InvalidLimit);
        }
        // SQLite offsets are signed 64-bit
        match (page - 1).checked_mul(page_limit) {
            Some(offset) if offset <= i64::MAX as u64 => Ok(Self { page, page_limit }),
            _ => Err(PaginationError::PageOutOfRange),
        }
    }

    pub fn to_db(self) -> DbPagination {
        DbPagination {
            offset: (self.page - 1).saturating_mul(self.page_limit),
            limit: self.page_limit,
        }
    }

    pub fn full(self, total: u64) -> FullPagination {
        FullPagination {
            page: self.page,
            page_limit: self.page_limit,
            page_count: total.div_ceil(self.page_limit).max(1),
            total,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DbPagination {
    pub offset: u64,
    pub limit: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct FullPagination {
    pub page: u64,
    pub page_limit: u64,
    pub page_count: u64,
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_offsets() {
        let p = Pagination::new(3, 20).unwrap();
        assert_eq!(p.to_db(), DbPagination { offset: 40, limit: 20 });
    }

    #[test]
    fn test_pagination_rejects_bad_values() {
        assert_eq!(Pagination::new(0, 20), Err(PaginationError::InvalidPage));
        assert_eq!(Pagination::new(1, 101), Err(PaginationError::InvalidLimit));
        assert_eq!(Pagination::new(1, 0), Err(PaginationError::InvalidLimit));
    }

    #[test]
    fn test_pagination_rejects_offset_overflow() {
        assert_eq!(
            Pagination::new(u64::MAX, 100),
            Err(PaginationError::PageOutOfRange)
        );
        assert_eq!(
            Pagination::new(u64::MAX / 2, 2),
            Err(PaginationError::PageOutOfRange)
        );

        let last = i64::MAX as u64 / 100 + 1;
        let p = Pagination::new(last, 100).unwrap();
        assert!(p.to_db().offset <= i64::MAX as u64);
    }

    #[test]
    fn test_full_pagination_page_count() {
        let p = Pagination::new(1, 20).unwrap();
        assert_eq!(p.full(0).page_count, 1);
        assert_eq!(p.full(20).page_count, 1);
        assert_eq!(p.full(21).page_count, 2);
        assert_eq!(p.full(41).total, 41);
    }

    #[test]
    fn test_file_info_key() {
        let info = FileInfo {
            id: "abc".to_string(),
            extension: ".png".to_string(),
            url: String::new(),
        };
        assert_eq!(info.key(), "abc.png");
    }
}
