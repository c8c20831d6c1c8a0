//! Mapping from engine errors to HTTP responses.
//!
//! Clients only ever see the classified error and its human-readable
//! message, never the underlying I/O or transport error text.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rapid_core::{DownloadError, ProviderError};
use serde::Serialize;
use thiserror::Error;

/// Axum-specific error type.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Unknown download id.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed input.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Change races with a live transfer or violates a lifecycle rule.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The provider or the remote server failed.
    #[error("Bad gateway: {0}")]
    BadGateway(String),

    /// Engine is shutting down.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HttpError {
    /// Status code for this error.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::BadGateway(_) => StatusCode::BAD_GATEWAY,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(self) -> String {
        match self {
            Self::NotFound(msg)
            | Self::BadRequest(msg)
            | Self::Conflict(msg)
            | Self::BadGateway(msg)
            | Self::ServiceUnavailable(msg)
            | Self::Internal(msg) => msg,
        }
    }
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    status: u16,
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(target: "rapid.http", status = status.as_u16(), error = %self, "Request failed");
        }
        let body = ErrorBody {
            error: self.message(),
            status: status.as_u16(),
        };
        (status, axum::Json(body)).into_response()
    }
}

impl From<DownloadError> for HttpError {
    fn from(err: DownloadError) -> Self {
        let message = err.user_message();
        match err {
            DownloadError::NotFound { .. } => Self::NotFound(message),
            DownloadError::InvalidRequest { .. }
            | DownloadError::ProviderResolution(
                ProviderError::UnknownProvider { .. } | ProviderError::InvalidRequest { .. },
            ) => Self::BadRequest(message),
            DownloadError::Conflict { .. } => Self::Conflict(message),
            DownloadError::ProviderResolution(_)
            | DownloadError::TransientTransfer { .. }
            | DownloadError::PermanentTransfer { .. } => Self::BadGateway(message),
            DownloadError::Unavailable { .. } => Self::ServiceUnavailable(message),
            DownloadError::Storage(_)
            | DownloadError::Finalize { .. }
            | DownloadError::Repository { .. } => Self::Internal(message),
        }
    }
}
