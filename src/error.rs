use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::api::auth::AuthError;
use crate::chapter::ChapterError;
use crate::models::PaginationError;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Unauthorized(#[from] AuthError),

    #[error("{0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    message: &'a str,
    code: u16,
}

#[derive(Serialize)]
struct ErrorResponse<'a> {
    error: ErrorBody<'a>,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self {
            ServerError::Validation(_) => (StatusCode::BAD_REQUEST, "validationError"),
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, "baseError"),
            ServerError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "authorizationError"),
            ServerError::Forbidden(_) => (StatusCode::FORBIDDEN, "authorizationError"),
            ServerError::Internal(detail) => {
                tracing::error!("Request failed: {}", detail);
                (StatusCode::INTERNAL_SERVER_ERROR, "appError")
            }
        };

        let message = match &self {
            ServerError::Internal(_) => "server error".to_string(),
            other => other.to_string(),
        };

        let body = ErrorResponse {
            error: ErrorBody {
                kind,
                message: &message,
                code: status.as_u16(),
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<ChapterError> for ServerError {
    fn from(e: ChapterError) -> Self {
        match e {
            ChapterError::MangaNotFound | ChapterError::ChapterNotFound => {
                ServerError::NotFound(e.to_string())
            }
            ChapterError::ArchiveFormat(_)
            | ChapterError::NoValidImages
            | ChapterError::PageTooLarge { .. } => {
                ServerError::Validation(e.to_string())
            }
            ChapterError::Infrastructure { .. } => ServerError::Internal(e.to_string()),
        }
    }
}

impl From<PaginationError> for ServerError {
    fn from(e: PaginationError) -> Self {
        ServerError::Validation(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn render(err: ServerError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_validation_error_body() {
        let (status, body) = render(ChapterError::NoValidImages.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["type"], "validationError");
        assert_eq!(body["error"]["code"], 400);
        assert_eq!(body["error"]["message"], "archive contains no valid page images");
    }

    #[tokio::test]
    async fn test_not_found_error_body() {
        let (status, body) = render(ChapterError::MangaNotFound.into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["type"], "baseError");
        assert_eq!(body["error"]["message"], "manga not found");
    }

    #[tokio::test]
    async fn test_internal_error_hides_detail() {
        let (status, body) = render(ServerError::Internal("db exploded".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["type"], "appError");
        assert_eq!(body["error"]["message"], "server error");
    }

    #[tokio::test]
    async fn test_auth_error_body() {
        let (status, body) = render(AuthError::Expired.into()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["type"], "authorizationError");
    }
}
