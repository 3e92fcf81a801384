use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    Json,
};

use super::AppState;
use crate::error::{Result, ServerError};
use crate::storage::{validate_location, StorageError};

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub async fn ping() -> &'static str {
    "pong"
}

/// Serve a stored page file. The path is `{bucket}/{key}`.
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Result<impl IntoResponse> {
    let not_found = || ServerError::NotFound("file not found".to_string());
    let (namespace, key) = path.rsplit_once('/').ok_or_else(not_found)?;
    validate_location(namespace, key).map_err(|_| not_found())?;

    let data = state.storage.get(namespace, key).await.map_err(|e| match e {
        StorageError::NotFound(_) => not_found(),
        other => ServerError::Internal(format!("read {path}: {other}")),
    })?;

    let content_type = mime_guess::from_path(key).first_or_octet_stream();
    Ok((
        [
            (header::CONTENT_TYPE, content_type.essence_str().to_string()),
            // Keys are content hashes
            (header::CACHE_CONTROL, "public, max-age=31536000, immutable".to_string()),
        ],
        data,
    ))
}
