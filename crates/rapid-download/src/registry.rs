//! Authoritative in-memory table of downloads.
//!
//! Entries are keyed by id and ordered by a creation sequence number. Pages
//! are buckets of that sequence, so an entry never moves to another page when
//! other entries are inserted or removed.
//!
//! Only a download's supervisor writes its entry; readers take snapshots.

use std::collections::{BTreeMap, HashMap};

use tokio::sync::RwLock;

use rapid_core::ports::StoredEntry;
use rapid_core::{Download, DownloadId, DownloadStatus, Page, Request};

#[derive(Default)]
struct Table {
    entries: BTreeMap<u64, StoredEntry>,
    index: HashMap<DownloadId, u64>,
    next_seq: u64,
}

/// Process-wide download table.
#[derive(Default)]
pub struct Registry {
    table: RwLock<Table>,
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate from durable storage.
    ///
    /// Downloads that were transferring when the process stopped come back
    /// paused. Returns the normalized entries in sequence order.
    pub async fn load(&self, entries: Vec<StoredEntry>) -> Vec<StoredEntry> {
        let mut table = self.table.write().await;
        let mut loaded = Vec::with_capacity(entries.len());
        for mut entry in entries {
            if entry.download.status == DownloadStatus::Downloading {
                entry.download.status = DownloadStatus::Paused;
            }
            entry.download.speed = 0.0;
            entry.download.time_left = None;

            if let Some(old) = table.index.insert(entry.download.id.clone(), entry.seq) {
                table.entries.remove(&old);
            }
            table.next_seq = table.next_seq.max(entry.seq + 1);
            table.entries.insert(entry.seq, entry.clone());
            loaded.push(entry);
        }
        loaded.sort_by_key(|e| e.seq);
        loaded
    }

    /// Insert a new download, assigning the next sequence number.
    pub async fn insert(&self, download: Download, request: Request) -> StoredEntry {
        let mut table = self.table.write().await;
        let seq = table.next_seq;
        table.next_seq += 1;
        table.index.insert(download.id.clone(), seq);
        let entry = StoredEntry {
            seq,
            download,
            request,
        };
        table.entries.insert(seq, entry.clone());
        entry
    }

    /// Snapshot of one download.
    pub async fn get(&self, id: &DownloadId) -> Option<Download> {
        let table = self.table.read().await;
        let seq = table.index.get(id)?;
        table.entries.get(seq).map(|e| e.download.clone())
    }

    /// Snapshot of one entry, including its request.
    pub async fn entry(&self, id: &DownloadId) -> Option<StoredEntry> {
        let table = self.table.read().await;
        let seq = table.index.get(id)?;
        table.entries.get(seq).cloned()
    }

    /// Replace the stored snapshot of an existing download.
    ///
    /// Returns `false` when the download is no longer registered.
    pub async fn commit(&self, download: &Download) -> bool {
        let mut table = self.table.write().await;
        let Some(seq) = table.index.get(&download.id).copied() else {
            return false;
        };
        match table.entries.get_mut(&seq) {
            Some(entry) => {
                entry.download.clone_from(download);
                true
            }
            None => false,
        }
    }

    /// Replace the stored snapshot and request of an existing download.
    pub async fn commit_with_request(&self, download: &Download, request: &Request) -> bool {
        let mut table = self.table.write().await;
        let Some(seq) = table.index.get(&download.id).copied() else {
            return false;
        };
        match table.entries.get_mut(&seq) {
            Some(entry) => {
                entry.download.clone_from(download);
                entry.request.clone_from(request);
                true
            }
            None => false,
        }
    }

    /// Remove a download.
    pub async fn remove(&self, id: &DownloadId) -> Option<StoredEntry> {
        let mut table = self.table.write().await;
        let seq = table.index.remove(id)?;
        table.entries.remove(&seq)
    }

    /// Number of registered downloads.
    pub async fn len(&self) -> usize {
        self.table.read().await.entries.len()
    }

    /// Whether the registry is empty.
    pub async fn is_empty(&self) -> bool {
        self.table.read().await.entries.is_empty()
    }

    /// Ids in creation order.
    pub async fn ids(&self) -> Vec<DownloadId> {
        self.table
            .read()
            .await
            .entries
            .values()
            .map(|e| e.download.id.clone())
            .collect()
    }

    /// One page (1-based; 0 is treated as 1) of `size` sequence slots.
    pub async fn page(&self, page: u32, size: usize) -> Page {
        let page = page.max(1);
        let size = size.max(1) as u64;
        let start = u64::from(page - 1).saturating_mul(size);
        let end = start.saturating_add(size);

        let table = self.table.read().await;
        let entries = table
            .entries
            .range(start..end)
            .map(|(_, e)| e.download.clone())
            .collect();
        let next_page = table
            .entries
            .range(end..)
            .next()
            .is_some()
            .then(|| page.saturating_add(1));

        Page {
            page,
            entries,
            next_page,
        }
    }
}
