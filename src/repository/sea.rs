//! SQLite repositories on top of the SeaORM entities.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use super::{ChapterStore, MangaLookup, PageStore, StoreError, StoreResult};
use crate::db::entities::{chapter, manga, page};
use crate::models::{Chapter, ChapterFilter, DbPagination, Manga, MangaFilter, Page};

fn parse_id(value: &str) -> Result<Uuid, DbErr> {
    Uuid::parse_str(value).map_err(|e| DbErr::Type(format!("bad uuid {value:?}: {e}")))
}

fn parse_time(secs: i64) -> Result<DateTime<Utc>, DbErr> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| DbErr::Type(format!("bad timestamp {secs}")))
}

fn parse_u32(value: i64) -> Result<u32, DbErr> {
    u32::try_from(value).map_err(|_| DbErr::Type(format!("value {value} out of range")))
}

fn manga_from_model(m: manga::Model) -> Result<Manga, DbErr> {
    Ok(Manga {
        id: parse_id(&m.id)?,
        title: m.title,
        slug: m.slug,
        created_at: parse_time(m.created_at)?,
    })
}

fn chapter_from_model(m: chapter::Model) -> Result<Chapter, DbErr> {
    Ok(Chapter {
        id: parse_id(&m.id)?,
        manga_id: parse_id(&m.manga_id)?,
        title: m.title,
        number: parse_u32(m.number)?,
        volume: parse_u32(m.volume)?,
        page_count: parse_u32(m.page_count)?,
        uploader_id: parse_id(&m.uploader_id)?,
        uploaded_at: parse_time(m.uploaded_at)?,
    })
}

fn page_from_model(m: page::Model) -> Result<Page, DbErr> {
    Ok(Page {
        id: parse_id(&m.id)?,
        chapter_id: parse_id(&m.chapter_id)?,
        url: m.url,
        storage_key: m.storage_key,
        number: parse_u32(m.number)?,
        height: m.height.map(parse_u32).transpose()?,
        width: m.width.map(parse_u32).transpose()?,
        created_at: parse_time(m.created_at)?,
    })
}

pub struct MangaRepository {
    db: Arc<DatabaseConnection>,
}

impl MangaRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Insert a catalog row. The catalog service normally owns this table.
    pub async fn create(&self, manga: &Manga) -> StoreResult<()> {
        manga::ActiveModel {
            id: Set(manga.id.to_string()),
            title: Set(manga.title.clone()),
            slug: Set(manga.slug.clone()),
            created_at: Set(manga.created_at.timestamp()),
        }
        .insert(self.db.as_ref())
        .await
        .map_err(StoreError::database("insert manga"))?;
        Ok(())
    }
}

#[async_trait]
impl MangaLookup for MangaRepository {
    async fn get_one(&self, filter: MangaFilter) -> StoreResult<Manga> {
        let mut query = manga::Entity::find();
        if let Some(id) = filter.id {
            query = query.filter(manga::Column::Id.eq(id.to_string()));
        }

        let model = query
            .one(self.db.as_ref())
            .await
            .map_err(StoreError::database("get manga"))?
            .ok_or(StoreError::NotFound)?;

        manga_from_model(model).map_err(StoreError::database("get manga"))
    }
}

pub struct ChapterRepository {
    db: Arc<DatabaseConnection>,
}

impl ChapterRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ChapterStore for ChapterRepository {
    async fn create(&self, chapter: &Chapter) -> StoreResult<()> {
        chapter::ActiveModel {
            id: Set(chapter.id.to_string()),
            manga_id: Set(chapter.manga_id.to_string()),
            title: Set(chapter.title.clone()),
            number: Set(i64::from(chapter.number)),
            volume: Set(i64::from(chapter.volume)),
            page_count: Set(i64::from(chapter.page_count)),
            uploader_id: Set(chapter.uploader_id.to_string()),
            uploaded_at: Set(chapter.uploaded_at.timestamp()),
        }
        .insert(self.db.as_ref())
        .await
        .map_err(StoreError::database("insert chapter"))?;
        Ok(())
    }

    async fn get_all_by_manga(
        &self,
        pagination: DbPagination,
        manga_id: Uuid,
    ) -> StoreResult<(Vec<Chapter>, u64)> {
        let by_manga = chapter::Entity::find()
            .filter(chapter::Column::MangaId.eq(manga_id.to_string()));

        let total = by_manga
            .clone()
            .count(self.db.as_ref())
            .await
            .map_err(StoreError::database("count chapters"))?;

        let models = by_manga
            .order_by_desc(chapter::Column::UploadedAt)
            .order_by_asc(chapter::Column::Id)
            .offset(pagination.offset)
            .limit(pagination.limit)
            .all(self.db.as_ref())
            .await
            .map_err(StoreError::database("list chapters"))?;

        let chapters = models
            .into_iter()
            .map(chapter_from_model)
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::database("list chapters"))?;

        Ok((chapters, total))
    }

    async fn get_by_id(&self, id: Uuid) -> StoreResult<Chapter> {
        let model = chapter::Entity::find_by_id(id.to_string())
            .one(self.db.as_ref())
            .await
            .map_err(StoreError::database("get chapter"))?
            .ok_or(StoreError::NotFound)?;

        chapter_from_model(model).map_err(StoreError::database("get chapter"))
    }

    async fn get_by_number(&self, filter: ChapterFilter) -> StoreResult<Chapter> {
        let model = chapter::Entity::find()
            .filter(chapter::Column::MangaId.eq(filter.manga_id.to_string()))
            .filter(chapter::Column::Number.eq(i64::from(filter.number)))
            .filter(chapter::Column::Volume.eq(i64::from(filter.volume)))
            .order_by_asc(chapter::Column::UploadedAt)
            .one(self.db.as_ref())
            .await
            .map_err(StoreError::database("get chapter by number"))?
            .ok_or(StoreError::NotFound)?;

        chapter_from_model(model).map_err(StoreError::database("get chapter by number"))
    }

    async fn count_by_manga(&self, manga_id: Uuid) -> StoreResult<u64> {
        chapter::Entity::find()
            .filter(chapter::Column::MangaId.eq(manga_id.to_string()))
            .count(self.db.as_ref())
            .await
            .map_err(StoreError::database("count chapters"))
    }

    async fn delete_with_pages(&self, id: Uuid) -> StoreResult<u64> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(StoreError::database("begin chapter delete"))?;

        let pages = page::Entity::delete_many()
            .filter(page::Column::ChapterId.eq(id.to_string()))
            .exec(&txn)
            .await
            .map_err(StoreError::database("delete pages"))?;

        let deleted = chapter::Entity::delete_by_id(id.to_string())
            .exec(&txn)
            .await
            .map_err(StoreError::database("delete chapter"))?;

        if deleted.rows_affected == 0 {
            txn.rollback()
                .await
                .map_err(StoreError::database("roll back chapter delete"))?;
            return Err(StoreError::NotFound);
        }

        txn.commit()
            .await
            .map_err(StoreError::database("commit chapter delete"))?;
        Ok(pages.rows_affected)
    }
}

pub struct PageRepository {
    db: Arc<DatabaseConnection>,
}

impl PageRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PageStore for PageRepository {
    async fn create(&self, page: &Page) -> StoreResult<()> {
        page::ActiveModel {
            id: Set(page.id.to_string()),
            chapter_id: Set(page.chapter_id.to_string()),
            url: Set(page.url.clone()),
            storage_key: Set(page.storage_key.clone()),
            number: Set(i64::from(page.number)),
            height: Set(page.height.map(i64::from)),
            width: Set(page.width.map(i64::from)),
            created_at: Set(page.created_at.timestamp()),
        }
        .insert(self.db.as_ref())
        .await
        .map_err(StoreError::database("insert page"))?;
        Ok(())
    }

    async fn get_all_by_chapter(&self, chapter_id: Uuid) -> StoreResult<Vec<Page>> {
        page::Entity::find()
            .filter(page::Column::ChapterId.eq(chapter_id.to_string()))
            .order_by_asc(page::Column::Number)
            .all(self.db.as_ref())
            .await
            .map_err(StoreError::database("list pages"))?
            .into_iter()
            .map(page_from_model)
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::database("list pages"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use chrono::Duration;
    use sea_orm::{ConnectionTrait, Statement};
    use tempfile::TempDir;

    async fn setup() -> (TempDir, Arc<DatabaseConnection>) {
        let temp_dir = TempDir::new().unwrap();
        let db = init_database(&temp_dir.path().join("test.db")).await.unwrap();
        (temp_dir, Arc::new(db))
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn manga(n: u128) -> Manga {
        Manga {
            id: Uuid::from_u128(n),
            title: format!("Manga {n}"),
            slug: format!("manga-{n}"),
            created_at: at(1_000),
        }
    }

    fn chapter(n: u128, manga_id: Uuid, number: u32, uploaded_at: DateTime<Utc>) -> Chapter {
        Chapter {
            id: Uuid::from_u128(n),
            manga_id,
            title: Some(format!("Chapter {number}")),
            number,
            volume: 1,
            page_count: 3,
            uploader_id: Uuid::from_u128(99),
            uploaded_at,
        }
    }

    fn page(n: u128, chapter_id: Uuid, number: u32) -> Page {
        Page {
            id: Uuid::from_u128(n),
            chapter_id,
            url: format!("http://files/{n}.png"),
            storage_key: format!("{n}.png"),
            number,
            height: Some(1200),
            width: None,
            created_at: at(2_000),
        }
    }

    #[tokio::test]
    async fn test_manga_lookup() {
        let (_dir, db) = setup().await;
        let repo = MangaRepository::new(db);
        repo.create(&manga(1)).await.unwrap();

        let found = repo.get_one(MangaFilter::by_id(Uuid::from_u128(1))).await.unwrap();
        assert_eq!(found, manga(1));

        let missing = repo.get_one(MangaFilter::by_id(Uuid::from_u128(2))).await;
        assert!(matches!(missing, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn test_chapter_roundtrip_and_listing() {
        let (_dir, db) = setup().await;
        MangaRepository::new(db.clone()).create(&manga(1)).await.unwrap();
        let repo = ChapterRepository::new(db);
        let manga_id = Uuid::from_u128(1);
        let base = at(10_000);

        for i in 0..5u32 {
            let c = chapter(100 + u128::from(i), manga_id, i + 1, base + Duration::seconds(i64::from(i)));
            repo.create(&c).await.unwrap();
        }

        let got = repo.get_by_id(Uuid::from_u128(102)).await.unwrap();
        assert_eq!(got, chapter(102, manga_id, 3, base + Duration::seconds(2)));

        let (first, total) = repo
            .get_all_by_manga(DbPagination { offset: 0, limit: 2 }, manga_id)
            .await
            .unwrap();
        assert_eq!(total, 5);
        let numbers: Vec<u32> = first.iter().map(|c| c.number).collect();
        assert_eq!(numbers, vec![5, 4]);

        let (last, _) = repo
            .get_all_by_manga(DbPagination { offset: 4, limit: 2 }, manga_id)
            .await
            .unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].number, 1);

        assert_eq!(repo.count_by_manga(manga_id).await.unwrap(), 5);
        assert_eq!(repo.count_by_manga(Uuid::from_u128(7)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_get_by_number_returns_first_duplicate() {
        let (_dir, db) = setup().await;
        MangaRepository::new(db.clone()).create(&manga(1)).await.unwrap();
        let repo = ChapterRepository::new(db);
        let manga_id = Uuid::from_u128(1);

        repo.create(&chapter(11, manga_id, 7, at(500))).await.unwrap();
        repo.create(&chapter(10, manga_id, 7, at(400))).await.unwrap();

        let filter = ChapterFilter {
            manga_id,
            number: 7,
            volume: 1,
        };
        assert_eq!(repo.get_by_number(filter).await.unwrap().id, Uuid::from_u128(10));

        let other_volume = ChapterFilter { volume: 2, ..filter };
        assert!(matches!(
            repo.get_by_number(other_volume).await,
            Err(StoreError::NotFound)
        ));
    }

    async fn chapter_with_pages(
        db: &Arc<DatabaseConnection>,
        n: u128,
    ) -> (ChapterRepository, PageRepository, Uuid) {
        let chapters = ChapterRepository::new(db.clone());
        let pages = PageRepository::new(db.clone());
        let chapter_id = Uuid::from_u128(n);
        chapters
            .create(&chapter(n, Uuid::from_u128(1), 1, at(100)))
            .await
            .unwrap();

        pages.create(&page(n * 10 + 3, chapter_id, 3)).await.unwrap();
        pages.create(&page(n * 10 + 1, chapter_id, 1)).await.unwrap();
        pages.create(&page(n * 10 + 2, chapter_id, 2)).await.unwrap();
        (chapters, pages, chapter_id)
    }

    #[tokio::test]
    async fn test_pages_ordered_and_deleted_with_chapter() {
        let (_dir, db) = setup().await;
        MangaRepository::new(db.clone()).create(&manga(1)).await.unwrap();
        let (chapters, pages, chapter_id) = chapter_with_pages(&db, 50).await;
        let (_, _, other_id) = chapter_with_pages(&db, 60).await;

        let listed = pages.get_all_by_chapter(chapter_id).await.unwrap();
        let numbers: Vec<u32> = listed.iter().map(|p| p.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(listed[0], page(501, chapter_id, 1));

        assert_eq!(chapters.delete_with_pages(chapter_id).await.unwrap(), 3);
        assert!(pages.get_all_by_chapter(chapter_id).await.unwrap().is_empty());
        assert!(matches!(
            chapters.get_by_id(chapter_id).await,
            Err(StoreError::NotFound)
        ));
        assert_eq!(pages.get_all_by_chapter(other_id).await.unwrap().len(), 3);

        assert!(matches!(
            chapters.delete_with_pages(chapter_id).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_failed_chapter_delete_keeps_pages() {
        let (_dir, db) = setup().await;
        MangaRepository::new(db.clone()).create(&manga(1)).await.unwrap();
        let (chapters, pages, chapter_id) = chapter_with_pages(&db, 50).await;

        db.execute(Statement::from_string(
            db.get_database_backend(),
            "CREATE TRIGGER keep_chapters BEFORE DELETE ON chapters \
             BEGIN SELECT RAISE(ABORT, 'chapters are locked'); END"
                .to_string(),
        ))
        .await
        .unwrap();

        let result = chapters.delete_with_pages(chapter_id).await;
        assert!(matches!(
            result,
            Err(StoreError::Database {
                operation: "delete chapter",
                ..
            })
        ));

        // The page delete ran first and was rolled back
        assert_eq!(pages.get_all_by_chapter(chapter_id).await.unwrap().len(), 3);
        assert!(chapters.get_by_id(chapter_id).await.is_ok());
    }
}
