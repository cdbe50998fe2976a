//! HTTP error mapping with flat JSON bodies

use crate::error::PhotoboothError;
use crate::pipeline::PipelineFailure;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// `{ "error": "..." }`
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Errors surfaced to HTTP clients
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Authentication required")]
    Unauthorized,
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// The canonical 404 for a missing stored file
    #[must_use]
    pub fn file_not_found() -> Self {
        Self::NotFound("File not found".to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, detail),
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, detail),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            },
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

impl From<PhotoboothError> for ApiError {
    fn from(err: PhotoboothError) -> Self {
        match err {
            PhotoboothError::Validation(message) => ApiError::BadRequest(message),
            PhotoboothError::NotFound(_) => ApiError::file_not_found(),
            err @ PhotoboothError::FrameNotFound(_) => ApiError::NotFound(err.to_string()),
            PhotoboothError::Unauthorized => ApiError::Unauthorized,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<PipelineFailure> for ApiError {
    fn from(failure: PipelineFailure) -> Self {
        match failure.error {
            err if err.is_client_error() => err.into(),
            err => ApiError::Internal(format!("{} ({})", err, failure.stage)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::progress::PipelineStage;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (PhotoboothError::validation("Invalid file type"), StatusCode::BAD_REQUEST),
            (PhotoboothError::not_found("/srv/outputs/x.png"), StatusCode::NOT_FOUND),
            (PhotoboothError::FrameNotFound(1), StatusCode::NOT_FOUND),
            (PhotoboothError::Unauthorized, StatusCode::UNAUTHORIZED),
            (PhotoboothError::segmentation("oom"), StatusCode::INTERNAL_SERVER_ERROR),
            (PhotoboothError::storage_write("disk full"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), status);
        }
    }

    #[test]
    fn test_not_found_hides_path() {
        let api = ApiError::from(PhotoboothError::not_found("/srv/outputs/x.png"));
        assert!(matches!(api, ApiError::NotFound(ref m) if m == "File not found"));
    }

    #[test]
    fn test_pipeline_failure_keeps_validation_message() {
        let failure = PipelineFailure {
            stage: PipelineStage::StoreUpload,
            error: PhotoboothError::validation("No selected file"),
        };
        assert!(matches!(
            ApiError::from(failure),
            ApiError::BadRequest(ref m) if m == "No selected file"
        ));

        let failure = PipelineFailure {
            stage: PipelineStage::Segmentation,
            error: PhotoboothError::segmentation("model crashed"),
        };
        assert!(matches!(ApiError::from(failure), ApiError::Internal(_)));
    }
}
