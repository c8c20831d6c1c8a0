//! In-memory fakes for exercising the engine without network or disk.
//!
//! Available to this crate's tests and, with the `test-utils` feature, to
//! downstream crates.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use tokio::sync::Notify;

use rapid_core::ports::{
    ByteStream, ChunkStorage, ChunkWriter, DownloadEventEmitterPort, EntryRepositoryPort,
    ResourceInfo, StoredEntry, TransferPort,
};
use rapid_core::{
    ByteRange, ChunkError, DownloadEvent, DownloadId, RepositoryError, RequestTemplate,
    StorageError,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone)]
enum Script {
    Times(VecDeque<ChunkError>),
    Always(ChunkError),
    InterruptOnce,
}

/// Transport serving a fixed body, with scripted failures keyed by range start.
#[derive(Clone)]
pub struct ScriptedTransport {
    body: Bytes,
    accepts_ranges: bool,
    report_size: bool,
    mime_type: Option<String>,
    file_name: Option<String>,
    piece_size: usize,
    piece_delay: Option<Duration>,
    probe_error: Option<ChunkError>,
    scripts: Arc<Mutex<HashMap<u64, Script>>>,
    requests: Arc<Mutex<Vec<Option<ByteRange>>>>,
}

impl ScriptedTransport {
    /// Serve `body` with range support and a known size.
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            accepts_ranges: true,
            report_size: true,
            mime_type: Some("application/octet-stream".to_string()),
            file_name: None,
            piece_size: 16 * 1024,
            piece_delay: None,
            probe_error: None,
            scripts: Arc::new(Mutex::new(HashMap::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Split bodies into pieces of `size` bytes.
    #[must_use]
    pub fn with_piece_size(mut self, size: usize) -> Self {
        self.piece_size = size.max(1);
        self
    }

    /// Sleep before yielding each piece.
    #[must_use]
    pub const fn with_piece_delay(mut self, delay: Duration) -> Self {
        self.piece_delay = Some(delay);
        self
    }

    /// Report no range support on probe.
    #[must_use]
    pub const fn without_ranges(mut self) -> Self {
        self.accepts_ranges = false;
        self
    }

    /// Report no size on probe.
    #[must_use]
    pub const fn without_size(mut self) -> Self {
        self.report_size = false;
        self
    }

    /// Report a `Content-Disposition` file name on probe.
    #[must_use]
    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    /// Fail the probe.
    #[must_use]
    pub fn fail_probe(mut self, err: ChunkError) -> Self {
        self.probe_error = Some(err);
        self
    }

    /// Fail the next fetch starting at `offset` with `err`. Repeatable.
    #[must_use]
    pub fn fail_at(self, offset: u64, err: ChunkError) -> Self {
        match lock(&self.scripts)
            .entry(offset)
            .or_insert_with(|| Script::Times(VecDeque::new()))
        {
            Script::Times(queue) => queue.push_back(err),
            other => *other = Script::Times(VecDeque::from([err])),
        }
        self
    }

    /// Fail every fetch starting at `offset` with `err`.
    #[must_use]
    pub fn fail_always_at(self, offset: u64, err: ChunkError) -> Self {
        lock(&self.scripts).insert(offset, Script::Always(err));
        self
    }

    /// Deliver one piece of the next fetch at `offset`, then drop the connection.
    #[must_use]
    pub fn interrupt_once_at(self, offset: u64) -> Self {
        lock(&self.scripts).insert(offset, Script::InterruptOnce);
        self
    }

    /// Remove all scripted failures.
    pub fn clear_failures(&self) {
        lock(&self.scripts).clear();
    }

    /// Ranges requested so far, in order.
    #[must_use]
    pub fn requested_ranges(&self) -> Vec<Option<ByteRange>> {
        lock(&self.requests).clone()
    }

    fn next_script(&self, offset: u64) -> Option<Script> {
        let mut scripts = lock(&self.scripts);
        match scripts.get_mut(&offset)? {
            Script::Always(err) => Some(Script::Always(err.clone())),
            Script::Times(queue) => {
                let err = queue.pop_front();
                if queue.is_empty() {
                    scripts.remove(&offset);
                }
                err.map(|e| Script::Times(VecDeque::from([e])))
            }
            Script::InterruptOnce => scripts.remove(&offset),
        }
    }
}

#[async_trait]
impl TransferPort for ScriptedTransport {
    async fn probe(&self, template: &RequestTemplate) -> Result<ResourceInfo, ChunkError> {
        if let Some(err) = &self.probe_error {
            return Err(err.clone());
        }
        Ok(ResourceInfo {
            size: self.report_size.then_some(self.body.len() as u64),
            accepts_ranges: self.accepts_ranges,
            mime_type: self.mime_type.clone(),
            file_name: self.file_name.clone(),
            final_url: Some(template.url.clone()),
        })
    }

    async fn fetch(
        &self,
        _template: &RequestTemplate,
        range: Option<ByteRange>,
    ) -> Result<ByteStream, ChunkError> {
        lock(&self.requests).push(range);
        let offset = range.map_or(0, |r| r.start);

        let interrupt = match self.next_script(offset) {
            Some(Script::Always(err)) => return Err(err),
            Some(Script::Times(mut queue)) => {
                if let Some(err) = queue.pop_front() {
                    return Err(err);
                }
                false
            }
            Some(Script::InterruptOnce) => true,
            None => false,
        };

        let len = self.body.len() as u64;
        let (start, end) = range.map_or((0, len), |r| {
            (r.start.min(len), r.end.map_or(len, |e| e.min(len)))
        });
        let slice = self
            .body
            .slice(usize::try_from(start).unwrap_or(0)..usize::try_from(end).unwrap_or(0));

        let mut pieces: Vec<Result<Bytes, ChunkError>> = Vec::new();
        let mut cursor = 0;
        while cursor < slice.len() {
            let next = (cursor + self.piece_size).min(slice.len());
            pieces.push(Ok(slice.slice(cursor..next)));
            cursor = next;
        }
        if interrupt {
            pieces.truncate(1);
            pieces.push(Err(ChunkError::transient("connection reset by peer")));
        }

        let delay = self.piece_delay;
        Ok(futures_util::stream::iter(pieces)
            .then(move |piece| async move {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                piece
            })
            .boxed())
    }
}

#[derive(Default)]
struct MemoryState {
    parts: HashMap<DownloadId, Vec<u8>>,
    finished: HashMap<String, Vec<u8>>,
    fail_writes: bool,
    fail_finalize: bool,
}

/// Chunk storage backed by in-memory buffers.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStorage {
    /// Create empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write fail.
    pub fn fail_writes(&self, fail: bool) {
        lock(&self.state).fail_writes = fail;
    }

    /// Make finalize fail.
    pub fn fail_finalize(&self, fail: bool) {
        lock(&self.state).fail_finalize = fail;
    }

    /// Partial contents of a download.
    #[must_use]
    pub fn contents(&self, id: &DownloadId) -> Option<Vec<u8>> {
        lock(&self.state).parts.get(id).cloned()
    }

    /// Finalized contents by file name.
    #[must_use]
    pub fn finished(&self, file_name: &str) -> Option<Vec<u8>> {
        lock(&self.state).finished.get(file_name).cloned()
    }
}

struct MemoryWriter {
    state: Arc<Mutex<MemoryState>>,
    id: DownloadId,
    position: usize,
}

#[async_trait]
impl ChunkWriter for MemoryWriter {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), StorageError> {
        let mut state = lock(&self.state);
        if state.fail_writes {
            return Err(StorageError::new("Other", "No space left on device"));
        }
        let part = state.parts.entry(self.id.clone()).or_default();
        let end = self.position + bytes.len();
        if part.len() < end {
            part.resize(end, 0);
        }
        part[self.position..end].copy_from_slice(bytes);
        self.position = end;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), StorageError> {
        Ok(())
    }
}

#[async_trait]
impl ChunkStorage for MemoryStorage {
    async fn prepare(&self, id: &DownloadId, _size: Option<u64>) -> Result<(), StorageError> {
        lock(&self.state).parts.entry(id.clone()).or_default();
        Ok(())
    }

    async fn open_writer(
        &self,
        id: &DownloadId,
        offset: u64,
    ) -> Result<Box<dyn ChunkWriter>, StorageError> {
        let position = usize::try_from(offset)
            .map_err(|_| StorageError::new("InvalidInput", "offset out of range"))?;
        Ok(Box::new(MemoryWriter {
            state: Arc::clone(&self.state),
            id: id.clone(),
            position,
        }))
    }

    async fn truncate(&self, id: &DownloadId) -> Result<(), StorageError> {
        if let Some(part) = lock(&self.state).parts.get_mut(id) {
            part.clear();
        }
        Ok(())
    }

    async fn discard(&self, id: &DownloadId) -> Result<(), StorageError> {
        lock(&self.state).parts.remove(id);
        Ok(())
    }

    async fn finalize(
        &self,
        id: &DownloadId,
        file_name: &str,
        expected_size: Option<u64>,
    ) -> Result<PathBuf, StorageError> {
        let mut state = lock(&self.state);
        if state.fail_finalize {
            return Err(StorageError::new("InvalidData", "checksum mismatch"));
        }
        let data = state.parts.remove(id).unwrap_or_default();
        if let Some(expected) = expected_size {
            if data.len() as u64 != expected {
                let found = data.len();
                state.parts.insert(id.clone(), data);
                return Err(StorageError::new(
                    "InvalidData",
                    format!("expected {expected} bytes, found {found}"),
                ));
            }
        }
        state.finished.insert(file_name.to_string(), data);
        Ok(PathBuf::from("/memory").join(file_name))
    }
}

/// Entry repository backed by a map, counting writes.
#[derive(Clone, Default)]
pub struct MemoryEntryRepository {
    entries: Arc<Mutex<BTreeMap<String, StoredEntry>>>,
    saves: Arc<Mutex<usize>>,
}

impl MemoryEntryRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository pre-populated with entries.
    #[must_use]
    pub fn with_entries(entries: Vec<StoredEntry>) -> Self {
        let repo = Self::new();
        {
            let mut map = lock(&repo.entries);
            for entry in entries {
                map.insert(entry.download.id.to_string(), entry);
            }
        }
        repo
    }

    /// Number of `save` calls so far.
    #[must_use]
    pub fn save_count(&self) -> usize {
        *lock(&self.saves)
    }

    /// Persisted entry for an id.
    #[must_use]
    pub fn entry(&self, id: &DownloadId) -> Option<StoredEntry> {
        lock(&self.entries).get(id.as_str()).cloned()
    }
}

#[async_trait]
impl EntryRepositoryPort for MemoryEntryRepository {
    async fn load_all(&self) -> Result<Vec<StoredEntry>, RepositoryError> {
        let mut entries: Vec<StoredEntry> = lock(&self.entries).values().cloned().collect();
        entries.sort_by_key(|e| e.seq);
        Ok(entries)
    }

    async fn save(&self, entry: &StoredEntry) -> Result<(), RepositoryError> {
        lock(&self.entries).insert(entry.download.id.to_string(), entry.clone());
        *lock(&self.saves) += 1;
        Ok(())
    }

    async fn remove(&self, id: &DownloadId) -> Result<(), RepositoryError> {
        lock(&self.entries)
            .remove(id.as_str())
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }
}

/// Emitter that records every event and lets tests wait for one.
#[derive(Clone, Default)]
pub struct RecordingEmitter {
    events: Arc<Mutex<Vec<DownloadEvent>>>,
    notify: Arc<Notify>,
}

impl RecordingEmitter {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All events so far.
    #[must_use]
    pub fn events(&self) -> Vec<DownloadEvent> {
        lock(&self.events).clone()
    }

    fn find(&self, predicate: &impl Fn(&DownloadEvent) -> bool) -> Option<DownloadEvent> {
        lock(&self.events).iter().find(|e| predicate(e)).cloned()
    }

    /// Wait until an event matching `predicate` has been emitted.
    pub async fn wait_for(
        &self,
        predicate: impl Fn(&DownloadEvent) -> bool,
        timeout: Duration,
    ) -> Option<DownloadEvent> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(event) = self.find(&predicate) {
                return Some(event);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.find(&predicate);
            }
        }
    }
}

impl DownloadEventEmitterPort for RecordingEmitter {
    fn emit(&self, event: DownloadEvent) {
        lock(&self.events).push(event);
        self.notify.notify_waiters();
    }

    fn clone_box(&self) -> Box<dyn DownloadEventEmitterPort> {
        Box::new(self.clone())
    }
}
