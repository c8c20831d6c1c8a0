//! Core domain types for downloads.
//!
//! Pure data types with no I/O dependencies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use super::errors::DownloadError;

/// Stable opaque identifier for a download.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DownloadId(String);

impl DownloadId {
    /// Wrap an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DownloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DownloadId {
    type Err = DownloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(DownloadError::invalid_request("download id cannot be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// Status of a download.
///
/// Removal is not a status: a removed download is deleted from the registry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    /// Accepted, not started yet.
    #[default]
    Queued,
    /// Chunk workers are transferring bytes.
    Downloading,
    /// Stopped by the user or by the engine; resumable from the last observed chunks.
    Paused,
    /// All chunks transferred and finalized.
    Completed,
    /// A chunk failed permanently, retries ran out, or finalize failed.
    Failed,
}

impl DownloadStatus {
    /// Convert to string representation for storage and the wire.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Downloading => "downloading",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parse from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "queued" => Some(Self::Queued),
            "downloading" => Some(Self::Downloading),
            "paused" => Some(Self::Paused),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Whether chunk workers may be running in this status.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Downloading)
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A half-open byte range `[start, end)`.
///
/// `end` is `None` when the resource size is unknown and the range runs to
/// the end of the stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ByteRange {
    /// First byte (inclusive).
    pub start: u64,
    /// One past the last byte, if known.
    pub end: Option<u64>,
}

impl ByteRange {
    /// A bounded range.
    #[must_use]
    pub const fn new(start: u64, end: u64) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    /// A range that runs until the stream ends.
    #[must_use]
    pub const fn open(start: u64) -> Self {
        Self { start, end: None }
    }

    /// Number of bytes in the range, if bounded.
    #[must_use]
    pub fn len(&self) -> Option<u64> {
        self.end.map(|end| end.saturating_sub(self.start))
    }

    /// Whether the range is bounded and holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// The remainder of this range after `transferred` bytes.
    #[must_use]
    pub fn skip(&self, transferred: u64) -> Self {
        let start = self.start.saturating_add(transferred);
        Self {
            start: self.end.map_or(start, |end| start.min(end)),
            end: self.end,
        }
    }

    /// `Range` header value (`bytes=start-last`), inclusive on both ends.
    #[must_use]
    pub fn header_value(&self) -> String {
        match self.end {
            Some(end) if end > self.start => format!("bytes={}-{}", self.start, end - 1),
            _ => format!("bytes={}-", self.start),
        }
    }
}

/// A chunk of a download owned by a single chunk worker at a time.
///
/// Retry bookkeeping (`attempts`, `next_attempt_at`) lives on the assignment
/// and is advanced by the supervisor's scheduling loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkAssignment {
    /// Owning download.
    pub download_id: DownloadId,
    /// Zero-based chunk index.
    pub index: u32,
    /// Bytes owned by this chunk.
    pub range: ByteRange,
    /// Whether every byte of the range has been written.
    pub completed: bool,
    /// Bytes written so far (relative to `range.start`).
    pub transferred: u64,
    /// Failed attempts so far.
    pub attempts: u32,
    /// Earliest instant at which the next attempt may start.
    pub next_attempt_at: Option<Instant>,
}

impl ChunkAssignment {
    /// Create a fresh assignment for a planned range.
    #[must_use]
    pub const fn new(download_id: DownloadId, index: u32, range: ByteRange) -> Self {
        Self {
            download_id,
            index,
            range,
            completed: false,
            transferred: 0,
            attempts: 0,
            next_attempt_at: None,
        }
    }

    /// The part of the range still to be fetched.
    #[must_use]
    pub fn remaining_range(&self) -> ByteRange {
        self.range.skip(self.transferred)
    }
}

/// Fields needed to register a new download.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewDownload {
    /// Display name (file name).
    pub name: String,
    /// Source URL as submitted.
    pub url: String,
    /// Provider name that resolves the request.
    pub provider: String,
    /// Declared total size, if the source reported one.
    pub size: Option<u64>,
    /// Media type.
    pub mime_type: String,
    /// Number of planned chunks.
    pub chunk_len: u32,
    /// Whether chunks can be resumed independently.
    pub resumable: bool,
}

/// One logical download tracked end-to-end.
///
/// This is the wire shape exchanged with clients (camelCase JSON).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Download {
    /// Stable opaque identifier.
    pub id: DownloadId,
    /// Display name.
    pub name: String,
    /// Source URL.
    pub url: String,
    /// Provider name.
    pub provider: String,
    /// Declared total size in bytes (0 when unknown).
    pub size: u64,
    /// Media type.
    #[serde(rename = "type")]
    pub mime_type: String,
    /// Number of chunks.
    #[serde(rename = "chunklen")]
    pub chunk_len: u32,
    /// Whether the transfer can be resumed chunk by chunk.
    pub resumable: bool,
    /// Whether the source answered ranged requests when it was probed.
    #[serde(default)]
    pub accepts_ranges: bool,
    /// Overall progress, 0-100.
    pub progress: f64,
    /// Whether the source link or credentials are no longer valid.
    pub expired: bool,
    /// Indices of completed chunks, ascending.
    pub downloaded_chunks: Vec<u32>,
    /// Estimated seconds remaining; `None` while the speed is zero.
    pub time_left: Option<f64>,
    /// Smoothed transfer speed in bytes per second.
    pub speed: f64,
    /// Lifecycle status.
    pub status: DownloadStatus,
    /// Creation time.
    pub date: DateTime<Utc>,
    /// Human-readable reason for the last failure or expiry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Download {
    /// Build a queued download from its registration fields.
    #[must_use]
    pub fn from_new(id: DownloadId, new: NewDownload, date: DateTime<Utc>) -> Self {
        let chunk_len = if new.resumable {
            new.chunk_len.max(1)
        } else {
            1
        };
        Self {
            id,
            name: new.name,
            url: new.url,
            provider: new.provider,
            size: new.size.unwrap_or(0),
            mime_type: new.mime_type,
            chunk_len,
            resumable: new.resumable,
            accepts_ranges: new.resumable,
            progress: 0.0,
            expired: false,
            downloaded_chunks: Vec::new(),
            time_left: None,
            speed: 0.0,
            status: DownloadStatus::Queued,
            date,
            error: None,
        }
    }

    /// Declared size, if known.
    #[must_use]
    pub const fn known_size(&self) -> Option<u64> {
        if self.size == 0 { None } else { Some(self.size) }
    }

    /// Record a completed chunk, keeping the list sorted and unique.
    pub fn record_chunk(&mut self, index: u32) {
        if index >= self.chunk_len {
            return;
        }
        if let Err(pos) = self.downloaded_chunks.binary_search(&index) {
            self.downloaded_chunks.insert(pos, index);
        }
    }

    /// Whether every chunk index is recorded as completed.
    #[must_use]
    pub fn all_chunks_recorded(&self) -> bool {
        self.downloaded_chunks.len() == self.chunk_len as usize
            && self
                .downloaded_chunks
                .iter()
                .enumerate()
                .all(|(pos, &index)| pos as u32 == index)
    }

    /// Check the entity invariants, returning the first violation.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.downloaded_chunks.len() > self.chunk_len as usize {
            return Err(format!(
                "{} completed chunks exceed chunk count {}",
                self.downloaded_chunks.len(),
                self.chunk_len
            ));
        }
        if self.downloaded_chunks.windows(2).any(|w| w[0] >= w[1]) {
            return Err("completed chunk indices are not strictly ascending".to_string());
        }
        if self.downloaded_chunks.iter().any(|&i| i >= self.chunk_len) {
            return Err("completed chunk index out of bounds".to_string());
        }
        if !self.resumable && self.chunk_len > 1 {
            return Err("non-resumable download has more than one chunk".to_string());
        }
        if self.status == DownloadStatus::Completed && !self.all_chunks_recorded() {
            return Err("completed download is missing chunks".to_string());
        }
        if self.expired && !matches!(self.status, DownloadStatus::Failed | DownloadStatus::Paused)
        {
            return Err(format!("expired download has status {}", self.status));
        }
        Ok(())
    }
}
