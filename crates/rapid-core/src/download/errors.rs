//! Download error types.
//!
//! Errors crossing the engine boundary are serializable and never carry
//! `std::io::Error` or HTTP client errors directly. Low-level failures are
//! captured as kind/message strings and classified before they reach clients.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure to turn a request into a request template.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProviderError {
    /// No provider is registered under this name.
    #[error("Unknown provider: {name}")]
    UnknownProvider {
        /// The requested provider name.
        name: String,
    },

    /// Credentials are missing or expired.
    #[error("Authentication required: {message}")]
    AuthRequired {
        /// Why authentication is required.
        message: String,
    },

    /// Re-resolution did not complete in time.
    #[error("Provider re-resolution timed out after {seconds}s")]
    Timeout {
        /// Timeout that elapsed.
        seconds: u64,
    },

    /// The request itself is malformed (bad URL, unsupported scheme).
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Detailed error message.
        message: String,
    },
}

impl ProviderError {
    /// Create an unknown provider error.
    pub fn unknown(name: impl Into<String>) -> Self {
        Self::UnknownProvider { name: name.into() }
    }

    /// Create an auth required error.
    pub fn auth_required(message: impl Into<String>) -> Self {
        Self::AuthRequired {
            message: message.into(),
        }
    }

    /// Create an invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Whether the failure means credentials or links went stale.
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::AuthRequired { .. } | Self::Timeout { .. })
    }
}

/// Classified outcome of a failed chunk transfer attempt.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum ChunkError {
    /// Network hiccup, server overload or timeout. Eligible for retry.
    #[error("Transient transfer error: {message}")]
    Transient {
        /// Detailed error message.
        message: String,
    },

    /// Invalid link, unsupported range, unexpected response. Terminal.
    #[error("Permanent transfer error: {message}")]
    Permanent {
        /// Detailed error message.
        message: String,
        /// HTTP status code if available.
        #[serde(skip_serializing_if = "Option::is_none")]
        status_code: Option<u16>,
    },

    /// Link or credentials are no longer valid.
    #[error("Link expired: {message}")]
    Expired {
        /// Detailed error message.
        message: String,
    },

    /// Write to the storage region failed. Fatal to the whole download.
    #[error("Storage error: {0}")]
    Storage(StorageError),
}

impl ChunkError {
    /// Create a transient error.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Create a permanent error.
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent {
            message: message.into(),
            status_code: None,
        }
    }

    /// Create a permanent error with HTTP status code.
    pub fn permanent_with_status(message: impl Into<String>, status_code: u16) -> Self {
        Self::Permanent {
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    /// Create an expired-link error.
    pub fn expired(message: impl Into<String>) -> Self {
        Self::Expired {
            message: message.into(),
        }
    }

    /// Whether the supervisor may schedule another attempt.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

impl From<StorageError> for ChunkError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}

/// Disk or file system failure.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct StorageError {
    /// The kind of I/O error (e.g. "NotFound", "PermissionDenied").
    pub kind: String,
    /// Detailed error message.
    pub message: String,
}

impl StorageError {
    /// Create a storage error from kind and message strings.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Capture a `std::io::Error` as a serializable value.
    #[must_use]
    pub fn from_io_error(err: &std::io::Error) -> Self {
        Self {
            kind: format!("{:?}", err.kind()),
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::from_io_error(&err)
    }
}

/// Error type for engine and sync operations.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum DownloadError {
    /// Request could not be resolved by its provider.
    #[error("Provider resolution failed: {0}")]
    ProviderResolution(ProviderError),

    /// Retries for a transient error ran out.
    #[error("Transfer failed after retries: {message}")]
    TransientTransfer {
        /// Detailed error message.
        message: String,
    },

    /// A chunk failed permanently.
    #[error("Transfer failed: {message}")]
    PermanentTransfer {
        /// Detailed error message.
        message: String,
        /// HTTP status code if available.
        #[serde(skip_serializing_if = "Option::is_none")]
        status_code: Option<u16>,
    },

    /// Storage failure.
    #[error("Storage error: {0}")]
    Storage(StorageError),

    /// Post-transfer verification or rename failed.
    #[error("Finalize failed: {message}")]
    Finalize {
        /// Detailed error message.
        message: String,
    },

    /// Unknown download id.
    #[error("Not found: {id}")]
    NotFound {
        /// The id that was not found.
        id: String,
    },

    /// Malformed input from a client.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Detailed error message.
        message: String,
    },

    /// The change races with a live transfer.
    #[error("Conflict: {message}")]
    Conflict {
        /// Detailed error message.
        message: String,
    },

    /// The owning supervisor is gone (engine shutting down).
    #[error("Unavailable: {message}")]
    Unavailable {
        /// Detailed error message.
        message: String,
    },

    /// Durable registry failure.
    #[error("Repository error: {message}")]
    Repository {
        /// Detailed error message.
        message: String,
    },
}

impl DownloadError {
    /// Create a not found error.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Create an invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Create an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Create a finalize error.
    pub fn finalize(message: impl Into<String>) -> Self {
        Self::Finalize {
            message: message.into(),
        }
    }

    /// Create a repository error.
    pub fn repository(message: impl Into<String>) -> Self {
        Self::Repository {
            message: message.into(),
        }
    }

    /// Check if the failed download may succeed on an explicit retry.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::TransientTransfer { .. } | Self::Unavailable { .. } | Self::Repository { .. }
        )
    }

    /// Human-readable reason suitable for display.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::ProviderResolution(ProviderError::AuthRequired { .. }) => {
                "The link requires fresh credentials. Re-resolve the download.".to_string()
            }
            Self::ProviderResolution(ProviderError::UnknownProvider { name }) => {
                format!("No provider named '{name}' is available.")
            }
            Self::ProviderResolution(err) => err.to_string(),
            Self::TransientTransfer { .. } => {
                "The connection kept failing. Check your network and retry.".to_string()
            }
            Self::PermanentTransfer {
                status_code: Some(code),
                ..
            } => format!("The server rejected the transfer (HTTP {code})."),
            Self::PermanentTransfer { message, .. } => format!("The transfer failed: {message}"),
            Self::Storage(err) => format!("Could not write to disk: {}", err.message),
            Self::Finalize { message } => format!("Could not finish the file: {message}"),
            Self::NotFound { id } => format!("Download {id} does not exist."),
            Self::InvalidRequest { message } | Self::Conflict { message } => message.clone(),
            Self::Unavailable { .. } => "The download engine is not running.".to_string(),
            Self::Repository { .. } => "Could not save download state.".to_string(),
        }
    }
}

impl From<ProviderError> for DownloadError {
    fn from(err: ProviderError) -> Self {
        Self::ProviderResolution(err)
    }
}

impl From<StorageError> for DownloadError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}

impl From<ChunkError> for DownloadError {
    fn from(err: ChunkError) -> Self {
        match err {
            ChunkError::Transient { message } => Self::TransientTransfer { message },
            ChunkError::Permanent {
                message,
                status_code,
            } => Self::PermanentTransfer {
                message,
                status_code,
            },
            ChunkError::Expired { message } => {
                Self::ProviderResolution(ProviderError::AuthRequired { message })
            }
            ChunkError::Storage(err) => Self::Storage(err),
        }
    }
}

impl From<crate::ports::RepositoryError> for DownloadError {
    fn from(err: crate::ports::RepositoryError) -> Self {
        match err {
            crate::ports::RepositoryError::NotFound(id) => Self::NotFound { id },
            other => Self::Repository {
                message: other.to_string(),
            },
        }
    }
}
