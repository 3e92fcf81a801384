//! In-memory repositories for service tests, with failure injection.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use sea_orm::DbErr;
use uuid::Uuid;

use super::{ChapterStore, MangaLookup, PageStore, StoreError, StoreResult};
use crate::models::{Chapter, ChapterFilter, DbPagination, Manga, MangaFilter, Page};

fn injected(operation: &'static str) -> StoreError {
    StoreError::Database {
        operation,
        source: DbErr::Custom("injected failure".to_string()),
    }
}

#[derive(Default)]
pub struct MemoryMangas {
    mangas: Mutex<Vec<Manga>>,
    pub lookups: AtomicUsize,
}

impl MemoryMangas {
    pub fn with(mangas: Vec<Manga>) -> Self {
        Self {
            mangas: Mutex::new(mangas),
            lookups: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl MangaLookup for MemoryMangas {
    async fn get_one(&self, filter: MangaFilter) -> StoreResult<Manga> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.mangas
            .lock()
            .iter()
            .find(|m| filter.id.map_or(true, |id| m.id == id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }
}

/// Chapters linked to a page table so deletes can cascade
#[derive(Default)]
pub struct MemoryChapters {
    chapters: Mutex<Vec<Chapter>>,
    pages: Arc<MemoryPages>,
    pub fail_create: AtomicBool,
}

impl MemoryChapters {
    pub fn with_pages(pages: Arc<MemoryPages>) -> Self {
        Self {
            pages,
            ..Default::default()
        }
    }

    pub fn all(&self) -> Vec<Chapter> {
        self.chapters.lock().clone()
    }
}

#[async_trait]
impl ChapterStore for MemoryChapters {
    async fn create(&self, chapter: &Chapter) -> StoreResult<()> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(injected("insert chapter"));
        }
        self.chapters.lock().push(chapter.clone());
        Ok(())
    }

    async fn get_all_by_manga(
        &self,
        pagination: DbPagination,
        manga_id: Uuid,
    ) -> StoreResult<(Vec<Chapter>, u64)> {
        let mut matching: Vec<Chapter> = self
            .chapters
            .lock()
            .iter()
            .filter(|c| c.manga_id == manga_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at).then(a.id.cmp(&b.id)));

        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(pagination.offset as usize)
            .take(pagination.limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn get_by_id(&self, id: Uuid) -> StoreResult<Chapter> {
        self.chapters
            .lock()
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_by_number(&self, filter: ChapterFilter) -> StoreResult<Chapter> {
        self.chapters
            .lock()
            .iter()
            .find(|c| {
                c.manga_id == filter.manga_id
                    && c.number == filter.number
                    && c.volume == filter.volume
            })
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn count_by_manga(&self, manga_id: Uuid) -> StoreResult<u64> {
        Ok(self
            .chapters
            .lock()
            .iter()
            .filter(|c| c.manga_id == manga_id)
            .count() as u64)
    }

    async fn delete_with_pages(&self, id: Uuid) -> StoreResult<u64> {
        let mut chapters = self.chapters.lock();
        let before = chapters.len();
        chapters.retain(|c| c.id != id);
        if chapters.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(self.pages.remove_chapter(id))
    }
}

#[derive(Default)]
pub struct MemoryPages {
    pages: Mutex<Vec<Page>>,
    creates: AtomicUsize,
    /// 1-based `create` call that fails, if any
    pub fail_create_at: Mutex<Option<usize>>,
}

impl MemoryPages {
    pub fn all(&self) -> Vec<Page> {
        self.pages.lock().clone()
    }

    pub fn fail_on_create(&self, call: usize) {
        *self.fail_create_at.lock() = Some(call);
    }

    fn remove_chapter(&self, chapter_id: Uuid) -> u64 {
        let mut pages = self.pages.lock();
        let before = pages.len();
        pages.retain(|p| p.chapter_id != chapter_id);
        (before - pages.len()) as u64
    }
}

#[async_trait]
impl PageStore for MemoryPages {
    async fn create(&self, page: &Page) -> StoreResult<()> {
        let call = self.creates.fetch_add(1, Ordering::SeqCst) + 1;
        if *self.fail_create_at.lock() == Some(call) {
            return Err(injected("insert page"));
        }
        self.pages.lock().push(page.clone());
        Ok(())
    }

    async fn get_all_by_chapter(&self, chapter_id: Uuid) -> StoreResult<Vec<Page>> {
        let mut pages: Vec<Page> = self
            .pages
            .lock()
            .iter()
            .filter(|p| p.chapter_id == chapter_id)
            .cloned()
            .collect();
        pages.sort_by_key(|p| p.number);
        Ok(pages)
    }
}
