//! Start-up catalog seeding.
//!
//! Chapters can only be uploaded for a manga that exists, and catalog
//! management lives outside this server. `MANGA_BOOTSTRAP_MANGA` names one
//! entry to create at start-up so a fresh deployment can ingest right away.

use std::sync::Arc;

use chrono::SubsecRound;
use sea_orm::DatabaseConnection;

use crate::clock::Clock;
use crate::config::Config;
use crate::models::{Manga, MangaFilter};
use crate::repository::{MangaLookup, MangaRepository, StoreError, StoreResult};

/// Create the configured catalog entry unless it already exists.
///
/// Returns the entry, or `None` when no seed is configured.
pub async fn seed(
    config: &Config,
    db: Arc<DatabaseConnection>,
    clock: &dyn Clock,
) -> StoreResult<Option<Manga>> {
    let Some(seed) = &config.bootstrap_manga else {
        return Ok(None);
    };

    let mangas = MangaRepository::new(db);
    match mangas.get_one(MangaFilter::by_id(seed.id)).await {
        Ok(existing) => {
            tracing::debug!("Catalog entry {} already present", existing.id);
            Ok(Some(existing))
        }
        Err(StoreError::NotFound) => {
            let manga = Manga {
                id: seed.id,
                title: seed.title.clone(),
                slug: seed.slug(),
                created_at: clock.now().trunc_subsecs(0),
            };
            mangas.create(&manga).await?;
            tracing::info!("Created catalog entry {} ({})", manga.id, manga.slug);
            Ok(Some(manga))
        }
        Err(e) => Err(e),
    }
}
