mod api;
mod archive;
mod catalog;
mod chapter;
mod clock;
mod config;
mod db;
mod error;
mod models;
mod repository;
mod storage;
mod uploader;

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::{auth::TokenSigner, AppState};
use clock::SystemClock;
use config::Config;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "manga_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("Invalid configuration");

    // Initialize database
    let db = db::init_database(&config.database_path)
        .await
        .expect("Failed to initialize database");
    let db = Arc::new(db);
    tracing::info!("Database initialized at {:?}", config.database_path);

    catalog::seed(&config, db.clone(), &SystemClock)
        .await
        .expect("Failed to seed catalog");

    let storage = config
        .storage
        .build()
        .await
        .expect("Failed to initialize storage");
    tracing::info!("Storage backend: {:?}", config.storage.storage_type);

    let secret = match &config.token_secret {
        Some(secret) => secret.clone(),
        None => {
            tracing::warn!("MANGA_TOKEN_SECRET not set, tokens will not survive a restart");
            format!("{}{}", uuid::Uuid::new_v4().simple(), uuid::Uuid::new_v4().simple())
        }
    };
    let tokens = TokenSigner::new(secret.as_bytes(), config.token_ttl, Arc::new(SystemClock))
        .expect("Failed to create token signer");

    if let Some(user_id) = config.bootstrap_uploader {
        tracing::info!("Upload token for {}: {}", user_id, tokens.issue(user_id));
    }

    let state = Arc::new(AppState::new(&config, db, storage, tokens));
    let app = api::router(state);

    let addr = config.bind_addr;
    tracing::info!("Manga server starting on http://{}", addr);
    tracing::info!("Page files served from {}/files", config.public_url);
    tracing::info!("Cleanup policy for failed ingestion: {:?}", config.cleanup);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");
    axum::serve(listener, app).await.expect("Server error");
}
