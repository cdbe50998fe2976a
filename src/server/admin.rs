//! Admin routes for browsing and managing stored files

use super::auth::{expired_cookie, session_cookie, session_token};
use super::error::ApiError;
use super::AppState;
use crate::types::{Bucket, DeleteReport, StoredItem};
use axum::extract::{Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE, SET_COOKIE};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct FileListing {
    pub category: Bucket,
    pub files: Vec<StoredItem>,
}

/// Body of bulk delete and export requests
#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    #[serde(default)]
    pub filenames: Vec<String>,
    pub category: String,
}

impl BulkRequest {
    fn bucket(&self) -> Result<Bucket, ApiError> {
        Ok(self.category.parse()?)
    }
}

/// `POST /admin/login`
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let token = state.sessions.login(&body.password)?;
    let cookie = session_cookie(&token, state.sessions.ttl());
    Ok((
        [(SET_COOKIE, cookie)],
        Json(json!({ "success": true, "token": token })),
    )
        .into_response())
}

/// `POST /admin/logout`
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = session_token(&headers) {
        state.sessions.logout(&token);
    }
    (
        [(SET_COOKIE, expired_cookie())],
        Json(json!({ "success": true })),
    )
        .into_response()
}

/// `GET /admin/files/:category`
pub async fn list_files(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Json<FileListing>, ApiError> {
    let bucket: Bucket = category.parse()?;
    let files = state.storage.list(bucket).await?;
    Ok(Json(FileListing {
        category: bucket,
        files,
    }))
}

/// `POST /admin/delete`
pub async fn delete_files(
    State(state): State<AppState>,
    Json(body): Json<BulkRequest>,
) -> Result<Json<DeleteReport>, ApiError> {
    let bucket = body.bucket()?;
    let report = state.storage.delete(bucket, &body.filenames).await;
    tracing::info!(
        bucket = %bucket,
        deleted = report.deleted_count,
        failed = report.errors.len(),
        "Admin delete"
    );
    Ok(Json(report))
}

/// `POST /admin/export`
pub async fn export_files(
    State(state): State<AppState>,
    Json(body): Json<BulkRequest>,
) -> Result<Response, ApiError> {
    let bucket = body.bucket()?;
    let archive = state.storage.bulk_export(bucket, &body.filenames).await?;
    let filename = format!(
        "photobooth-{bucket}-{}.tar.gz",
        chrono::Utc::now().format("%Y%m%d-%H%M%S")
    );

    Ok((
        [
            (CONTENT_TYPE, "application/gzip".to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        archive,
    )
        .into_response())
}
