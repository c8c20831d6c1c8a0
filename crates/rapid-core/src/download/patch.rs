//! Client-facing write and read DTOs for the sync surface.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::errors::DownloadError;
use super::types::{Download, DownloadStatus};

/// A partial update submitted by a client.
///
/// Clients commonly echo a full `Download` back; engine-owned fields
/// (`progress`, `downloadedChunks`, `speed`, `timeLeft`, `expired`, `size`,
/// `chunklen`, `acceptsRanges`) are accepted on the wire and ignored.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateDownload {
    /// New display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New source URL (triggers re-resolution).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// New provider (triggers re-resolution).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Resumability hint. Only honoured before the first transfer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resumable: Option<bool>,
    /// Requested status, interpreted as a transfer-control intent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Echoed engine-owned fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downloaded_chunks: Option<Vec<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_left: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expired: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(rename = "chunklen", skip_serializing_if = "Option::is_none")]
    pub chunk_len: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepts_ranges: Option<bool>,
}

impl UpdateDownload {
    /// Names of engine-owned fields present in this patch.
    #[must_use]
    pub fn ignored_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.progress.is_some() {
            fields.push("progress");
        }
        if self.downloaded_chunks.is_some() {
            fields.push("downloadedChunks");
        }
        if self.speed.is_some() {
            fields.push("speed");
        }
        if self.time_left.is_some() {
            fields.push("timeLeft");
        }
        if self.expired.is_some() {
            fields.push("expired");
        }
        if self.size.is_some() {
            fields.push("size");
        }
        if self.chunk_len.is_some() {
            fields.push("chunklen");
        }
        if self.accepts_ranges.is_some() {
            fields.push("acceptsRanges");
        }
        fields
    }

    /// Whether the patch changes how the resource is fetched.
    #[must_use]
    pub const fn touches_source(&self) -> bool {
        self.url.is_some() || self.provider.is_some()
    }

    /// Patch that only carries a status intent.
    pub fn status(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            ..Self::default()
        }
    }
}

/// Transfer-control intent derived from a requested status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intent {
    /// Stop workers, keep completed chunks.
    Pause,
    /// Start, resume or retry, depending on the current status.
    Resume,
    /// Explicit user removal.
    Remove,
}

impl Intent {
    /// Translate a requested status into an intent against `current`.
    ///
    /// Returns `Ok(None)` when nothing needs to happen.
    pub fn from_status(
        requested: &str,
        current: DownloadStatus,
    ) -> Result<Option<Self>, DownloadError> {
        let requested = requested.trim().to_ascii_lowercase();
        match requested.as_str() {
            "cancelled" | "canceled" | "removed" => return Ok(Some(Self::Remove)),
            _ => {}
        }

        let Some(target) = DownloadStatus::parse(&requested) else {
            return Err(DownloadError::invalid_request(format!(
                "unknown status '{requested}'"
            )));
        };
        if target == current {
            return Ok(None);
        }

        match target {
            DownloadStatus::Paused => match current {
                DownloadStatus::Queued | DownloadStatus::Downloading => Ok(Some(Self::Pause)),
                _ => Err(DownloadError::conflict(format!(
                    "cannot pause a {current} download"
                ))),
            },
            DownloadStatus::Downloading | DownloadStatus::Queued => match current {
                DownloadStatus::Completed => Err(DownloadError::conflict(
                    "download is already completed",
                )),
                DownloadStatus::Downloading => Ok(None),
                _ => Ok(Some(Self::Resume)),
            },
            DownloadStatus::Completed | DownloadStatus::Failed => {
                Err(DownloadError::invalid_request(format!(
                    "status '{target}' is set by the engine, not by clients"
                )))
            }
        }
    }
}

/// Order-correlated batch of updates.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchUpdate {
    /// Target ids.
    pub ids: Vec<String>,
    /// One patch per id, same order.
    pub payload: Vec<UpdateDownload>,
}

/// Result of applying one item of a batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOutcome {
    /// Position in the batch.
    pub index: usize,
    /// Target id, if one was supplied at this position.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Whether the update was applied.
    pub ok: bool,
    /// Reason for failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ItemOutcome {
    /// A successful item.
    #[must_use]
    pub const fn applied(index: usize, id: String) -> Self {
        Self {
            index,
            id: Some(id),
            ok: true,
            error: None,
        }
    }

    /// A failed item.
    #[must_use]
    pub fn rejected(index: usize, id: Option<String>, error: &DownloadError) -> Self {
        Self {
            index,
            id,
            ok: false,
            error: Some(error.to_string()),
        }
    }
}

/// Per-item results of a batch update.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// One entry per batch position.
    pub results: Vec<ItemOutcome>,
}

impl BatchOutcome {
    /// Whether every item was applied.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(|r| r.ok)
    }

    /// Ids (or positions, when no id was given) of the items that failed.
    #[must_use]
    pub fn failed(&self) -> Vec<&ItemOutcome> {
        self.results.iter().filter(|r| !r.ok).collect()
    }
}

/// One page of downloads in creation order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Page {
    /// 1-based page number.
    pub page: u32,
    /// Downloads on this page, oldest first.
    pub entries: Vec<Download>,
    /// Next page number, if more downloads follow.
    pub next_page: Option<u32>,
}

impl Page {
    /// Wire mapping of id to download, preserving order.
    #[must_use]
    pub fn into_map(self) -> IndexMap<String, Download> {
        self.entries
            .into_iter()
            .map(|d| (d.id.to_string(), d))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_translation() {
        use DownloadStatus as S;

        assert_eq!(
            Intent::from_status("paused", S::Downloading).unwrap(),
            Some(Intent::Pause)
        );
        assert_eq!(
            Intent::from_status("downloading", S::Paused).unwrap(),
            Some(Intent::Resume)
        );
        assert_eq!(
            Intent::from_status("downloading", S::Failed).unwrap(),
            Some(Intent::Resume)
        );
        assert_eq!(Intent::from_status("paused", S::Paused).unwrap(), None);
        assert_eq!(
            Intent::from_status("cancelled", S::Completed).unwrap(),
            Some(Intent::Remove)
        );
        assert!(Intent::from_status("completed", S::Downloading).is_err());
        assert!(Intent::from_status("paused", S::Completed).is_err());
        assert!(Intent::from_status("bogus", S::Queued).is_err());
    }

    #[test]
    fn test_echoed_download_parses_as_patch() {
        let json = r#"{
            "id": "abc", "name": "renamed.bin", "url": "https://x/y", "provider": "direct",
            "size": 10, "type": "text/plain", "chunklen": 2, "resumable": true,
            "progress": 50.0, "expired": false, "downloadedChunks": [0],
            "timeLeft": null, "speed": 0.0, "status": "paused", "date": "2024-01-01T00:00:00Z",
            "acceptsRanges": false
        }"#;
        let patch: UpdateDownload = serde_json::from_str(json).unwrap();
        assert_eq!(patch.name.as_deref(), Some("renamed.bin"));
        assert_eq!(patch.status.as_deref(), Some("paused"));
        assert!(patch.touches_source());
        assert!(patch.ignored_fields().contains(&"downloadedChunks"));
        assert!(!patch.ignored_fields().contains(&"timeLeft"));
        assert!(patch.ignored_fields().contains(&"acceptsRanges"));
    }

    #[test]
    fn test_batch_outcome() {
        let outcome = BatchOutcome {
            results: vec![
                ItemOutcome::applied(0, "a".into()),
                ItemOutcome::rejected(1, Some("b".into()), &DownloadError::not_found("b")),
            ],
        };
        assert!(!outcome.all_succeeded());
        assert_eq!(outcome.failed().len(), 1);
        assert_eq!(outcome.failed()[0].id.as_deref(), Some("b"));
    }
}
