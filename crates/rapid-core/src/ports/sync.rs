//! Client-facing sync surface.
//!
//! Reads come from the registry; writes are translated into supervisor
//! intents when they target a live transfer.

use async_trait::async_trait;

use crate::download::{
    BatchOutcome, BatchUpdate, Download, DownloadError, DownloadId, Page, Request, UpdateDownload,
};

/// Paginated reads and batch/point writes over all downloads.
#[async_trait]
pub trait SyncPort: Send + Sync {
    /// One page of downloads in creation order (1-based).
    async fn list_page(&self, page: u32) -> Result<Page, DownloadError>;

    /// A single download snapshot.
    async fn get(&self, id: &DownloadId) -> Result<Download, DownloadError>;

    /// Accept a new transfer intent.
    async fn create(&self, request: Request) -> Result<Download, DownloadError>;

    /// Apply order-correlated patches; each item succeeds or fails on its own.
    async fn batch_update(&self, batch: BatchUpdate) -> BatchOutcome;

    /// Apply one patch.
    async fn update(&self, id: &DownloadId, patch: UpdateDownload)
    -> Result<Download, DownloadError>;

    /// Explicit user removal.
    async fn remove(&self, id: &DownloadId) -> Result<(), DownloadError>;

    /// Supply a new request for an expired or failed download.
    async fn reresolve(&self, id: &DownloadId, request: Request)
    -> Result<Download, DownloadError>;
}
