use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::services::upload_session::UploadError;
use crate::utils::validation::Rejection;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Upload rejected: {0}")]
    Validation(Rejection),

    #[error("Malformed upload: {0}")]
    MalformedUpload(String),

    #[error("Client aborted the upload")]
    ClientAborted,

    #[error("Storage failure: {0}")]
    Storage(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Rejected(rejection) => AppError::Validation(rejection),
            UploadError::ClientAborted => AppError::ClientAborted,
            UploadError::Malformed(msg) => AppError::MalformedUpload(msg),
            UploadError::Storage(e) => AppError::Storage(e.to_string()),
            UploadError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl AppError {
    /// Stable machine-readable kind reported alongside the message.
    fn kind(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "bad_request",
            AppError::Validation(Rejection::Extension { .. }) => "extension_rejected",
            AppError::Validation(Rejection::Size { .. }) => "size_rejected",
            AppError::MalformedUpload(_) => "malformed_upload",
            AppError::ClientAborted => "client_aborted",
            AppError::Storage(_) => "storage_failure",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Validation(rejection) => {
                let status = match rejection {
                    Rejection::Extension { .. } => StatusCode::BAD_REQUEST,
                    Rejection::Size { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                };
                (status, rejection.to_string())
            }
            AppError::MalformedUpload(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::ClientAborted => (
                StatusCode::BAD_REQUEST,
                "client aborted the upload".to_string(),
            ),
            AppError::Storage(msg) => {
                tracing::error!("Storage failure: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "storage backend failed".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message,
            "kind": kind,
        }));

        (status, body).into_response()
    }
}
