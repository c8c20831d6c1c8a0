//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the boundaries between the download engine and the outside
//! world: providers, the network, the file system, durable storage, event
//! sinks and the client-facing sync surface. Implementations live in
//! `rapid-download`, `rapid-db` and `rapid-axum`.
//!
//! # Design Rules
//!
//! - No `reqwest`, `sqlx` or `axum` types in any signature
//! - All traits require `Send + Sync` for async compatibility
//! - Domain-specific error types, not implementation-specific ones

pub mod entry_repository;
pub mod event_emitter;
pub mod provider;
pub mod storage;
pub mod sync;
pub mod transfer;

use thiserror::Error;

pub use entry_repository::{EntryRepositoryPort, StoredEntry};
pub use event_emitter::{DownloadEventEmitterPort, NoopDownloadEmitter};
pub use provider::{Provider, ProviderContext};
pub use storage::{ChunkStorage, ChunkWriter};
pub use sync::SyncPort;
pub use transfer::{ByteStream, ResourceInfo, TransferPort};

/// Domain-specific errors for repository operations.
///
/// This error type abstracts away storage implementation details
/// (e.g., `SQLite` errors) and provides a clean interface for the engine.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The requested entity was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage backend error (database, filesystem, etc.).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}
