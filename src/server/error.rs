//! HTTP error responses.

use crate::error::ConvertError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Errors a handler turns into a non-redirect response.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The multipart body could not be read.
    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    /// The body exceeded the configured upload limit.
    #[error("Upload exceeds {0} bytes")]
    UploadTooLarge(usize),

    /// The batch failed for a reason other than "nothing to return".
    #[error(transparent)]
    Convert(#[from] ConvertError),
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    code: &'static str,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ServerError::InvalidUpload(msg) => {
                (StatusCode::BAD_REQUEST, "INVALID_UPLOAD", msg.clone())
            }
            ServerError::UploadTooLarge(limit) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "UPLOAD_TOO_LARGE",
                format!("Upload exceeds the {} MiB limit", limit / (1024 * 1024)),
            ),
            ServerError::Convert(err @ ConvertError::EmptyBatch { .. }) => {
                (StatusCode::BAD_REQUEST, "EMPTY_BATCH", err.notice())
            }
            ServerError::Convert(
                err @ (ConvertError::StagingFailed { .. }
                | ConvertError::ScratchUnavailable { .. }),
            ) => (StatusCode::INTERNAL_SERVER_ERROR, "STAGING_FAILED", err.notice()),
            ServerError::Convert(err) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "CONVERSION_ERROR", err.notice())
            }
        };

        let body = ErrorResponse {
            success: false,
            error: message,
            code,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn staging_failure_is_500_with_notice() {
        let err = ServerError::from(ConvertError::StagingFailed {
            path: PathBuf::from("/tmp/x"),
            source: std::io::Error::other("disk full"),
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn bad_multipart_is_400() {
        let response = ServerError::InvalidUpload("truncated".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
