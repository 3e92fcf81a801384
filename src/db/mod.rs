//! Database module for SQLite persistence using SeaORM

pub mod entities;

use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};
use std::path::Path;

/// Initialize database connection and create tables
pub async fn init_database(db_path: &Path) -> Result<DatabaseConnection, DbErr> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| DbErr::Custom(format!("cannot create {}: {}", parent.display(), e)))?;
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());
    tracing::info!("Connecting to database: {}", db_url);

    let db = Database::connect(&db_url).await?;

    create_tables(&db).await?;

    Ok(db)
}

async fn execute(db: &DatabaseConnection, sql: &str) -> Result<(), DbErr> {
    db.execute(Statement::from_string(db.get_database_backend(), sql.to_string()))
        .await?;
    Ok(())
}

/// Create all tables if they don't exist
async fn create_tables(db: &DatabaseConnection) -> Result<(), DbErr> {
    // Owned by the catalog; only read here
    execute(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS mangas (
            id TEXT PRIMARY KEY NOT NULL,
            title TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .await?;

    execute(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS chapters (
            id TEXT PRIMARY KEY NOT NULL,
            manga_id TEXT NOT NULL,
            title TEXT,
            number INTEGER NOT NULL,
            volume INTEGER NOT NULL,
            page_count INTEGER NOT NULL,
            uploader_id TEXT NOT NULL,
            uploaded_at INTEGER NOT NULL,
            FOREIGN KEY (manga_id) REFERENCES mangas(id) ON DELETE CASCADE
        )
        "#,
    )
    .await?;

    execute(
        db,
        r#"CREATE INDEX IF NOT EXISTS idx_chapters_manga ON chapters(manga_id)"#,
    )
    .await?;

    // Not unique: the same number/volume may be uploaded twice
    execute(
        db,
        r#"CREATE INDEX IF NOT EXISTS idx_chapters_number ON chapters(manga_id, number, volume)"#,
    )
    .await?;

    execute(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS pages (
            id TEXT PRIMARY KEY NOT NULL,
            chapter_id TEXT NOT NULL,
            url TEXT NOT NULL,
            storage_key TEXT NOT NULL,
            number INTEGER NOT NULL,
            height INTEGER,
            width INTEGER,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (chapter_id) REFERENCES chapters(id) ON DELETE CASCADE
        )
        "#,
    )
    .await?;

    execute(
        db,
        r#"CREATE INDEX IF NOT EXISTS idx_pages_chapter ON pages(chapter_id)"#,
    )
    .await?;

    tracing::info!("Database tables initialized");
    Ok(())
}
