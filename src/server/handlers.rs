//! Public routes: processing, downloads and health

use super::error::ApiError;
use super::AppState;
use crate::pipeline::{ProcessRequest, DEFAULT_NAME};
use crate::types::Bucket;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Multipart field carrying the photograph
pub const IMAGE_FIELD: &str = "person_image";

/// Multipart field selecting the frame
pub const FRAME_FIELD: &str = "image_set_background";

/// Success body of `POST /process`
#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub success: bool,
    pub message: String,
    pub name: String,
    pub number: String,
    pub output_file: String,
    pub download_url: String,
}

/// Parse the frame selector; anything non-numeric selects frame 1
#[must_use]
pub fn parse_frame_index(raw: &str) -> i64 {
    raw.trim().parse().unwrap_or(1)
}

/// `POST /process`
pub async fn process(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ProcessResponse>, ApiError> {
    let mut image: Option<(String, Vec<u8>)> = None;
    let mut frame_index = 1;
    let mut name = DEFAULT_NAME.to_string();
    let mut number = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            IMAGE_FIELD => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?;
                image = Some((filename, bytes.to_vec()));
            },
            FRAME_FIELD | "name" | "number" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?;
                match field_name.as_str() {
                    FRAME_FIELD => frame_index = parse_frame_index(&value),
                    "name" => name = value,
                    _ => number = value,
                }
            },
            other => tracing::debug!(field = other, "Ignoring unknown multipart field"),
        }
    }

    let (filename, bytes) =
        image.ok_or_else(|| ApiError::BadRequest("No image file provided".to_string()))?;

    let request = ProcessRequest::new(bytes, filename)
        .frame_index(frame_index)
        .name(name)
        .number(number);
    let outcome = state.orchestrator.process(request).await?;

    Ok(Json(ProcessResponse {
        success: true,
        message: "Image processed successfully".to_string(),
        name: outcome.name,
        number: outcome.number,
        output_file: outcome.output_file,
        download_url: outcome.download_url,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct DownloadQuery {
    inline: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ViewQuery {
    download: Option<String>,
}

fn flag_set(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

/// `GET /download/:filename`
pub async fn download(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    let inline = flag_set(query.inline.as_deref());
    serve_file(&state, Bucket::Outputs, &filename, !inline).await
}

/// `GET /view-upload/:filename`
pub async fn view_upload(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    Query(query): Query<ViewQuery>,
) -> Result<Response, ApiError> {
    let attachment = flag_set(query.download.as_deref());
    serve_file(&state, Bucket::Uploads, &filename, attachment).await
}

async fn serve_file(
    state: &AppState,
    bucket: Bucket,
    filename: &str,
    attachment: bool,
) -> Result<Response, ApiError> {
    let bytes = state
        .storage
        .read(bucket, filename)
        .await?
        .ok_or_else(ApiError::file_not_found)?;

    let mime = mime_guess::from_path(filename)
        .first_or_octet_stream()
        .to_string();
    let disposition = if attachment { "attachment" } else { "inline" };

    Ok((
        [
            (CONTENT_TYPE, mime),
            (
                CONTENT_DISPOSITION,
                format!("{disposition}; filename=\"{filename}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}
