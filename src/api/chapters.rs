//! Chapter endpoints.

use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::auth::AuthUser;
use super::AppState;
use crate::archive::file_extension;
use crate::error::{Result, ServerError};
use crate::models::{
    Chapter, ChapterFilter, ChapterWithPages, CreateChapter, FullPagination, Pagination,
    DEFAULT_PAGE_LIMIT,
};

fn validation(message: impl Into<String>) -> ServerError {
    ServerError::Validation(message.into())
}

fn parse_uuid(value: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|_| validation(format!("invalid {what} ID")))
}

fn parse_number(value: Option<&str>, field: &str) -> Result<u32> {
    let value = value.ok_or_else(|| validation(format!("{field} is required")))?;
    value
        .trim()
        .parse()
        .map_err(|_| validation(format!("invalid {field}")))
}

fn multipart_error(e: MultipartError) -> ServerError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        validation("pages zip file is too big")
    } else {
        validation(e.body_text())
    }
}

#[derive(Default)]
struct ChapterForm {
    manga_id: Option<String>,
    title: Option<String>,
    number: Option<String>,
    volume: Option<String>,
    archive: Option<(String, Bytes)>,
}

impl ChapterForm {
    async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut form = ChapterForm::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "pages_zip_file" => {
                    let filename = field.file_name().unwrap_or_default().to_string();
                    let data = field.bytes().await.map_err(multipart_error)?;
                    form.archive = Some((filename, data));
                }
                "manga_id" | "title" | "number" | "volume" => {
                    let text = field.text().await.map_err(multipart_error)?;
                    let slot = match name.as_str() {
                        "manga_id" => &mut form.manga_id,
                        "title" => &mut form.title,
                        "number" => &mut form.number,
                        _ => &mut form.volume,
                    };
                    *slot = Some(text);
                }
                other => tracing::debug!("Ignoring unknown form field {}", other),
            }
        }

        Ok(form)
    }
}

/// Upload a chapter as a ZIP of page images
pub async fn create_chapter(
    State(state): State<Arc<AppState>>,
    AuthUser(uploader_id): AuthUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Chapter>)> {
    let form = ChapterForm::read(multipart).await?;

    let (filename, archive) = form
        .archive
        .ok_or_else(|| validation("pages zip file is required"))?;
    if file_extension(&filename) != ".zip" {
        return Err(validation("pages zip file must have a .zip extension"));
    }
    if archive.len() > state.max_archive_bytes {
        return Err(validation("pages zip file is too big"));
    }

    let manga_id = form
        .manga_id
        .as_deref()
        .ok_or_else(|| validation("manga_id is required"))?;
    let input = CreateChapter {
        manga_id: parse_uuid(manga_id.trim(), "manga")?,
        uploader_id,
        title: form.title.filter(|t| !t.trim().is_empty()),
        number: parse_number(form.number.as_deref(), "number")?,
        volume: parse_number(form.volume.as_deref(), "volume")?,
        archive,
    };

    tracing::debug!(
        "Create chapter request: manga {} number {} volume {} ({} bytes from {})",
        input.manga_id,
        input.number,
        input.volume,
        input.archive.len(),
        filename
    );

    let chapter = state.chapters.create_chapter(input).await?;
    Ok((StatusCode::CREATED, Json(chapter)))
}

pub async fn get_chapter(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ChapterWithPages>> {
    let id = parse_uuid(&id, "chapter")?;
    Ok(Json(state.chapters.get_chapter(id).await?))
}

/// Only the uploader may delete a chapter
pub async fn delete_chapter(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let id = parse_uuid(&id, "chapter")?;
    let existing = state.chapters.get_chapter(id).await?;
    if existing.chapter.uploader_id != user_id {
        return Err(ServerError::Forbidden(
            "only the uploader can delete a chapter".to_string(),
        ));
    }

    state.chapters.delete_chapter(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    page: Option<String>,
    page_limit: Option<String>,
}

impl PageQuery {
    fn pagination(&self) -> Result<Pagination> {
        let page = match self.page.as_deref() {
            None | Some("") => 1,
            Some(v) => v
                .parse()
                .map_err(|_| validation("Invalid page query parameter"))?,
        };
        let page_limit = match self.page_limit.as_deref() {
            None | Some("") => DEFAULT_PAGE_LIMIT,
            Some(v) => v
                .parse()
                .map_err(|_| validation("Invalid page_limit query parameter"))?,
        };
        Ok(Pagination::new(page, page_limit)?)
    }
}

#[derive(Debug, Serialize)]
pub struct ChapterList {
    chapters: Vec<Chapter>,
    pagination: FullPagination,
}

pub async fn list_chapters(
    State(state): State<Arc<AppState>>,
    Path(manga_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ChapterList>> {
    let manga_id = parse_uuid(&manga_id, "manga")?;
    let pagination = query.pagination()?;

    let (chapters, total) = state.chapters.list_chapters(manga_id, pagination).await?;
    Ok(Json(ChapterList {
        chapters,
        pagination: pagination.full(total),
    }))
}

#[derive(Debug, Serialize)]
pub struct ChapterCount {
    manga_id: Uuid,
    count: u64,
}

pub async fn count_chapters(
    State(state): State<Arc<AppState>>,
    Path(manga_id): Path<String>,
) -> Result<Json<ChapterCount>> {
    let manga_id = parse_uuid(&manga_id, "manga")?;
    let count = state.chapters.count_chapters(manga_id).await?;
    Ok(Json(ChapterCount { manga_id, count }))
}

#[derive(Debug, Deserialize)]
pub struct NumberQuery {
    number: Option<String>,
    volume: Option<String>,
}

pub async fn get_chapter_by_number(
    State(state): State<Arc<AppState>>,
    Path(manga_id): Path<String>,
    Query(query): Query<NumberQuery>,
) -> Result<Json<ChapterWithPages>> {
    let filter = ChapterFilter {
        manga_id: parse_uuid(&manga_id, "manga")?,
        number: parse_number(query.number.as_deref(), "number")?,
        volume: parse_number(query.volume.as_deref(), "volume")?,
    };
    Ok(Json(state.chapters.get_chapter_by_number(filter).await?))
}
