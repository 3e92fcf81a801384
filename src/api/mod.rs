pub mod auth;
mod chapters;
mod handlers;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use sea_orm::DatabaseConnection;
use tower_http::trace::TraceLayer;

use crate::chapter::ChapterService;
use crate::clock::{RandomIds, SystemClock};
use crate::config::Config;
use crate::repository::{ChapterRepository, MangaRepository, PageRepository};
use crate::storage::StorageBackend;
use crate::uploader::{Uploader, FILES_ROUTE};

use auth::TokenSigner;

/// Room for multipart framing and the text fields around the archive
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Application state shared across handlers
pub struct AppState {
    pub chapters: ChapterService,
    pub storage: Arc<dyn StorageBackend>,
    pub tokens: TokenSigner,
    pub max_archive_bytes: usize,
}

impl AppState {
    /// Wire the SQLite repositories and the storage backend into the services
    pub fn new(
        config: &Config,
        db: Arc<DatabaseConnection>,
        storage: Arc<dyn StorageBackend>,
        tokens: TokenSigner,
    ) -> Self {
        let uploader = Uploader::new(storage.clone(), config.public_url.clone());
        let chapters = ChapterService::new(
            Arc::new(MangaRepository::new(db.clone())),
            Arc::new(ChapterRepository::new(db.clone())),
            Arc::new(PageRepository::new(db)),
            Arc::new(uploader),
            Arc::new(SystemClock),
            Arc::new(RandomIds),
            config.cleanup,
        )
        .with_max_page_bytes(config.max_page_bytes);

        Self {
            chapters,
            storage,
            tokens,
            max_archive_bytes: config.max_archive_bytes,
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = state.max_archive_bytes + MULTIPART_OVERHEAD;

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/ping", get(handlers::ping))
        .route("/api/v1/chapter", post(chapters::create_chapter))
        .route(
            "/api/v1/chapter/:id",
            get(chapters::get_chapter).delete(chapters::delete_chapter),
        )
        .route(
            "/api/v1/manga/:manga_id/chapters",
            get(chapters::list_chapters),
        )
        .route(
            "/api/v1/manga/:manga_id/chapters/count",
            get(chapters::count_chapters),
        )
        .route(
            "/api/v1/manga/:manga_id/chapter",
            get(chapters::get_chapter_by_number),
        )
        .route(&format!("{FILES_ROUTE}/*path"), get(handlers::get_file))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
}
