//! Download events - discriminated union for all download state changes.

use serde::{Deserialize, Serialize};

use super::types::Download;

/// Single discriminated union for all download events.
///
/// Serialized with a `type` tag:
///
/// ```typescript
/// type DownloadEvent =
///   | { type: "download_created"; download: Download }
///   | { type: "download_started"; id: string; chunk_len: number }
///   | { type: "chunk_progress"; id: string; index: number; transferred: number; size: number | null }
///   | { type: "download_progress"; id: string; progress: number; speed: number; time_left: number | null }
///   | { type: "chunk_completed"; id: string; index: number }
///   | { type: "download_paused"; id: string }
///   | { type: "download_expired"; id: string; reason: string }
///   | { type: "download_completed"; id: string; path: string }
///   | { type: "download_failed"; id: string; error: string }
///   | { type: "download_removed"; id: string };
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DownloadEvent {
    /// A download was registered.
    DownloadCreated {
        /// Snapshot at creation.
        download: Box<Download>,
    },

    /// Chunk workers were scheduled.
    DownloadStarted {
        /// Download id.
        id: String,
        /// Number of chunks.
        chunk_len: u32,
    },

    /// Progress of a single chunk.
    ChunkProgress {
        /// Download id.
        id: String,
        /// Chunk index.
        index: u32,
        /// Bytes of this chunk written so far.
        transferred: u64,
        /// Chunk size, if known.
        size: Option<u64>,
    },

    /// Aggregated download progress.
    DownloadProgress {
        /// Download id.
        id: String,
        /// Overall progress, 0-100.
        progress: f64,
        /// Smoothed speed in bytes per second.
        speed: f64,
        /// Estimated seconds remaining.
        time_left: Option<f64>,
    },

    /// A chunk finished its byte range.
    ChunkCompleted {
        /// Download id.
        id: String,
        /// Chunk index.
        index: u32,
    },

    /// The download is paused.
    DownloadPaused {
        /// Download id.
        id: String,
    },

    /// The link or credentials expired; waiting for re-resolution.
    DownloadExpired {
        /// Download id.
        id: String,
        /// Human-readable reason.
        reason: String,
    },

    /// All chunks transferred and the file was finalized.
    DownloadCompleted {
        /// Download id.
        id: String,
        /// Final file location.
        path: String,
    },

    /// The download failed.
    DownloadFailed {
        /// Download id.
        id: String,
        /// Human-readable reason.
        error: String,
    },

    /// The download was removed by the user.
    DownloadRemoved {
        /// Download id.
        id: String,
    },
}

impl DownloadEvent {
    /// Create a created event.
    #[must_use]
    pub fn created(download: Download) -> Self {
        Self::DownloadCreated {
            download: Box::new(download),
        }
    }

    /// Create a started event.
    pub fn started(id: impl Into<String>, chunk_len: u32) -> Self {
        Self::DownloadStarted {
            id: id.into(),
            chunk_len,
        }
    }

    /// Create a paused event.
    pub fn paused(id: impl Into<String>) -> Self {
        Self::DownloadPaused { id: id.into() }
    }

    /// Create a failed event.
    pub fn failed(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self::DownloadFailed {
            id: id.into(),
            error: error.into(),
        }
    }

    /// Create a removed event.
    pub fn removed(id: impl Into<String>) -> Self {
        Self::DownloadRemoved { id: id.into() }
    }

    /// Id of the download this event concerns.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::DownloadCreated { download } => download.id.as_str(),
            Self::DownloadStarted { id, .. }
            | Self::ChunkProgress { id, .. }
            | Self::DownloadProgress { id, .. }
            | Self::ChunkCompleted { id, .. }
            | Self::DownloadPaused { id }
            | Self::DownloadExpired { id, .. }
            | Self::DownloadCompleted { id, .. }
            | Self::DownloadFailed { id, .. }
            | Self::DownloadRemoved { id } => id,
        }
    }

    /// Whether the supervisor stopped all work after this event.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::DownloadPaused { .. }
                | Self::DownloadExpired { .. }
                | Self::DownloadCompleted { .. }
                | Self::DownloadFailed { .. }
                | Self::DownloadRemoved { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_tagging() {
        let event = DownloadEvent::ChunkProgress {
            id: "a".into(),
            index: 2,
            transferred: 10,
            size: Some(100),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "chunk_progress");
        assert_eq!(json["index"], 2);

        let json = serde_json::to_value(DownloadEvent::failed("a", "boom")).unwrap();
        assert_eq!(json["type"], "download_failed");
        assert_eq!(json["error"], "boom");
    }

    #[test]
    fn test_terminal_events() {
        assert!(DownloadEvent::paused("a").is_terminal());
        assert!(DownloadEvent::removed("a").is_terminal());
        assert!(!DownloadEvent::started("a", 4).is_terminal());
        assert_eq!(DownloadEvent::started("xyz", 1).id(), "xyz");
    }
}
