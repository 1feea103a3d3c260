//! API error types.

use crate::package::PackageError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use depot_storage::StorageError;
use depot_transport::TransportError;
use serde::Serialize;

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("metadata corrupt: {0}")]
    MetadataCorrupt(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("metadata error: {0}")]
    Metadata(#[from] depot_metadata::MetadataError),

    #[error("invalid package id: {0}")]
    Core(#[from] depot_core::Error),

    #[error("{0}")]
    Transport(#[from] TransportError),
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized(_) => "unauthorized",
            Self::Internal(_) => "internal_error",
            Self::MetadataCorrupt(_) => "metadata_corrupt",
            Self::Storage(_) => "storage_error",
            Self::Metadata(_) => "metadata_error",
            Self::Core(_) => "invalid_package_id",
            Self::Transport(e) => transport_code(e),
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::MetadataCorrupt(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Storage(e) => match e {
                StorageError::NotFound(_) => StatusCode::NOT_FOUND,
                StorageError::AlreadyExists(_) => StatusCode::CONFLICT,
                // Raised while unpacking an uploaded archive.
                StorageError::Archive { .. }
                | StorageError::MetaTooLarge { .. }
                | StorageError::MetaCorrupt(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Metadata(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Core(_) => StatusCode::BAD_REQUEST,
            Self::Transport(e) => match e {
                TransportError::AlreadyLocal(_) => StatusCode::CONFLICT,
                TransportError::NoHolder(_) => StatusCode::SERVICE_UNAVAILABLE,
                TransportError::PeerFetchFailed { .. } => StatusCode::BAD_GATEWAY,
                TransportError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
                TransportError::LocalIo(_)
                | TransportError::Metadata(_)
                | TransportError::Client(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

/// Error code of a transport failure, also used as the metrics label.
pub fn transport_code(err: &TransportError) -> &'static str {
    match err {
        TransportError::AlreadyLocal(_) => "already_local",
        TransportError::NoHolder(_) => "no_holder",
        TransportError::PeerFetchFailed { .. } => "peer_fetch_failed",
        TransportError::LocalIo(_) => "local_io_failed",
        TransportError::Metadata(_) => "metadata_error",
        TransportError::Client(_) => "client_error",
        TransportError::ShuttingDown => "shutting_down",
    }
}

impl From<PackageError> for ApiError {
    fn from(err: PackageError) -> Self {
        match err {
            PackageError::NotFound(id) => Self::NotFound(format!("package not found: {id}")),
            e @ PackageError::MetadataCorrupt { .. } => Self::MetadataCorrupt(e.to_string()),
            PackageError::Storage(e) => Self::Storage(e),
            PackageError::Metadata(e) => Self::Metadata(e),
            PackageError::Transport(e) => Self::Transport(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "Request failed");
        }
        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
