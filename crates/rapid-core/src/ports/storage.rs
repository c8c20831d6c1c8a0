//! Storage port for the byte region backing a download.
//!
//! Each chunk worker writes only its own disjoint range through a
//! [`ChunkWriter`] positioned at its offset.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::download::{DownloadId, StorageError};

/// Sequential writer positioned at a chunk's offset.
#[async_trait]
pub trait ChunkWriter: Send {
    /// Append bytes at the current position.
    async fn write(&mut self, bytes: &[u8]) -> Result<(), StorageError>;

    /// Flush buffered bytes to the backing store.
    async fn flush(&mut self) -> Result<(), StorageError>;
}

/// Backing store for in-progress downloads.
#[async_trait]
pub trait ChunkStorage: Send + Sync {
    /// Create (or reopen) the region for a download.
    async fn prepare(&self, id: &DownloadId, size: Option<u64>) -> Result<(), StorageError>;

    /// Open a writer positioned at `offset`.
    async fn open_writer(
        &self,
        id: &DownloadId,
        offset: u64,
    ) -> Result<Box<dyn ChunkWriter>, StorageError>;

    /// Drop all bytes written so far (non-resumable restart).
    async fn truncate(&self, id: &DownloadId) -> Result<(), StorageError>;

    /// Delete the region entirely.
    async fn discard(&self, id: &DownloadId) -> Result<(), StorageError>;

    /// Verify the region and move it to its final name.
    async fn finalize(
        &self,
        id: &DownloadId,
        file_name: &str,
        expected_size: Option<u64>,
    ) -> Result<PathBuf, StorageError>;
}
