//! Persistence seams used by the chapter service.
//!
//! `sea` holds the SQLite implementations. Tests swap in the in-memory
//! fakes from `memory`.

mod sea;

#[cfg(test)]
pub(crate) mod memory;

use async_trait::async_trait;
use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Chapter, ChapterFilter, DbPagination, Manga, MangaFilter, Page};

pub use sea::{ChapterRepository, MangaRepository, PageRepository};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("database error during {operation}: {source}")]
    Database {
        operation: &'static str,
        #[source]
        source: DbErr,
    },
}

impl StoreError {
    pub fn database(operation: &'static str) -> impl FnOnce(DbErr) -> Self {
        move |source| StoreError::Database { operation, source }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait MangaLookup: Send + Sync {
    async fn get_one(&self, filter: MangaFilter) -> StoreResult<Manga>;
}

#[async_trait]
pub trait ChapterStore: Send + Sync {
    async fn create(&self, chapter: &Chapter) -> StoreResult<()>;

    /// One page of a manga's chapters, newest upload first, plus the total count
    async fn get_all_by_manga(
        &self,
        pagination: DbPagination,
        manga_id: Uuid,
    ) -> StoreResult<(Vec<Chapter>, u64)>;

    async fn get_by_id(&self, id: Uuid) -> StoreResult<Chapter>;

    /// First chapter matching the natural key
    async fn get_by_number(&self, filter: ChapterFilter) -> StoreResult<Chapter>;

    async fn count_by_manga(&self, manga_id: Uuid) -> StoreResult<u64>;

    /// Delete a chapter row and its page rows in one transaction.
    /// Returns how many page rows were removed.
    async fn delete_with_pages(&self, id: Uuid) -> StoreResult<u64>;
}

#[async_trait]
pub trait PageStore: Send + Sync {
    async fn create(&self, page: &Page) -> StoreResult<()>;

    /// Pages of a chapter ordered by number
    async fn get_all_by_chapter(&self, chapter_id: Uuid) -> StoreResult<Vec<Page>>;
}
