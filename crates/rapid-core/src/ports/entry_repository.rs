//! Durable registry port definition.
//!
//! Persists download snapshots on state transitions so the registry survives
//! restarts. Per-progress ticks stay in memory.

use async_trait::async_trait;

use super::RepositoryError;
use crate::download::{Download, DownloadId, Request};

/// A persisted download with its creation sequence and source request.
///
/// The sequence is the stable sort key used for pagination. The request is
/// kept so a restarted engine can resolve the download again.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredEntry {
    /// Monotonic creation sequence.
    pub seq: u64,
    /// Snapshot of the download.
    pub download: Download,
    /// Request the download was created (or last re-resolved) from.
    pub request: Request,
}

/// Port for persisting registry entries.
///
/// # Usage
///
/// ```ignore
/// let repo: Arc<dyn EntryRepositoryPort> = /* ... */;
/// repo.save(&StoredEntry { seq, download, request }).await?;
/// let entries = repo.load_all().await?;
/// ```
#[async_trait]
pub trait EntryRepositoryPort: Send + Sync {
    /// Load every persisted entry, ordered by sequence.
    async fn load_all(&self) -> Result<Vec<StoredEntry>, RepositoryError>;

    /// Insert or replace an entry.
    async fn save(&self, entry: &StoredEntry) -> Result<(), RepositoryError>;

    /// Delete an entry. Returns `NotFound` if it does not exist.
    async fn remove(&self, id: &DownloadId) -> Result<(), RepositoryError>;
}
