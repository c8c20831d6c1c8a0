use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use mockall::mock;

use rapid_core::ports::{EntryRepositoryPort, StoredEntry};
use rapid_core::{
    ByteRange, ChunkError, Cookie, Download, DownloadError, DownloadEvent, DownloadId,
    DownloadStatus, EngineConfig, NewDownload, RepositoryError, Request, UpdateDownload,
};

use super::{DownloadEngine, EngineDeps};
use crate::provider::ProviderResolver;
use crate::testing::{MemoryEntryRepository, MemoryStorage, RecordingEmitter, ScriptedTransport};

const WAIT: Duration = Duration::from_secs(10);
const URL: &str = "https://example.com/files/data.bin";

fn body() -> Vec<u8> {
    (0..4000u32).map(|i| (i % 251) as u8).collect()
}

fn config() -> EngineConfig {
    EngineConfig::new("/unused")
        .with_chunk_count(4)
        .with_retries(2, Duration::from_millis(10))
        .with_progress_interval(Duration::ZERO)
        .with_cancel_grace(Duration::from_millis(500))
}

struct Harness {
    engine: DownloadEngine,
    transport: ScriptedTransport,
    storage: MemoryStorage,
    repository: MemoryEntryRepository,
    events: RecordingEmitter,
}

impl Harness {
    fn new(transport: ScriptedTransport) -> Self {
        Self::build(transport, config(), MemoryEntryRepository::new())
    }

    fn build(
        transport: ScriptedTransport,
        config: EngineConfig,
        repository: MemoryEntryRepository,
    ) -> Self {
        let storage = MemoryStorage::new();
        let events = RecordingEmitter::new();
        let engine = DownloadEngine::new(EngineDeps {
            transport: Arc::new(transport.clone()),
            storage: Arc::new(storage.clone()),
            repository: Arc::new(repository.clone()),
            emitter: Arc::new(events.clone()),
            resolver: ProviderResolver::with_builtin(&config),
            config,
        })
        .unwrap();
        Self {
            engine,
            transport,
            storage,
            repository,
            events,
        }
    }

    async fn wait(&self, id: &DownloadId, predicate: impl Fn(&DownloadEvent) -> bool) -> DownloadEvent {
        let id = id.to_string();
        self.events
            .wait_for(move |e| e.id() == id && predicate(e), WAIT)
            .await
            .expect("expected event was not emitted")
    }

    fn ranges_since(&self, skip: usize) -> Vec<Option<ByteRange>> {
        self.transport.requested_ranges().into_iter().skip(skip).collect()
    }
}

fn is_completed(e: &DownloadEvent) -> bool {
    matches!(e, DownloadEvent::DownloadCompleted { .. })
}

fn is_failed(e: &DownloadEvent) -> bool {
    matches!(e, DownloadEvent::DownloadFailed { .. })
}

fn resumable(value: bool) -> UpdateDownload {
    UpdateDownload {
        resumable: Some(value),
        ..UpdateDownload::default()
    }
}

fn assert_progress_never_decreases(events: &RecordingEmitter) {
    let mut last = 0.0;
    for event in events.events() {
        if let DownloadEvent::DownloadProgress { progress, .. } = event {
            assert!(progress >= last, "progress went backwards: {last} -> {progress}");
            last = progress;
        }
    }
}

#[tokio::test]
async fn test_four_chunks_complete() {
    let h = Harness::new(ScriptedTransport::new(body()).with_piece_size(128));

    let created = h.engine.create(Request::new(URL)).await.unwrap();
    assert_eq!(created.chunk_len, 4);
    assert!(created.resumable);
    assert_eq!(created.name, "data.bin");
    assert_eq!(created.size, 4000);

    h.wait(&created.id, is_completed).await;

    let download = h.engine.get(&created.id).await.unwrap();
    assert_eq!(download.status, DownloadStatus::Completed);
    assert!((download.progress - 100.0).abs() < f64::EPSILON);
    assert_eq!(download.downloaded_chunks, vec![0, 1, 2, 3]);
    assert!(download.check_invariants().is_ok());
    assert_eq!(h.storage.finished("data.bin").unwrap(), body());

    let persisted = h.repository.entry(&created.id).unwrap();
    assert_eq!(persisted.download.status, DownloadStatus::Completed);

    assert_progress_never_decreases(&h.events);
}

#[tokio::test]
async fn test_exhausted_chunk_fails_and_keeps_others() {
    let transport = ScriptedTransport::new(body())
        .fail_always_at(2000, ChunkError::transient("connection reset"));
    let h = Harness::new(transport);

    let created = h.engine.create(Request::new(URL)).await.unwrap();
    h.wait(&created.id, is_failed).await;

    let failed = h.engine.get(&created.id).await.unwrap();
    assert_eq!(failed.status, DownloadStatus::Failed);
    assert_eq!(failed.downloaded_chunks, vec![0, 1, 3]);
    assert!(failed.error.is_some());
    assert_eq!(&h.storage.contents(&created.id).unwrap()[..2000], &body()[..2000]);

    // Retrying only fetches the missing chunk.
    let before = h.transport.requested_ranges().len();
    h.transport.clear_failures();
    h.engine.start(&created.id).await.unwrap();
    h.wait(&created.id, is_completed).await;

    assert_eq!(h.ranges_since(before), vec![Some(ByteRange::new(2000, 3000))]);
    assert_eq!(h.storage.finished("data.bin").unwrap(), body());
}

#[tokio::test]
async fn test_permanent_chunk_error_fails_download() {
    let transport = ScriptedTransport::new(body())
        .fail_always_at(2000, ChunkError::permanent_with_status("Not Found", 404));
    let h = Harness::new(transport);

    let created = h.engine.create(Request::new(URL)).await.unwrap();
    let event = h.wait(&created.id, is_failed).await;

    let DownloadEvent::DownloadFailed { error, .. } = event else {
        unreachable!()
    };
    assert!(error.contains("404"));
    let download = h.engine.get(&created.id).await.unwrap();
    assert_eq!(download.status, DownloadStatus::Failed);
    assert!(!download.downloaded_chunks.contains(&2));
    assert!(download.check_invariants().is_ok());
}

#[tokio::test]
async fn test_expired_link_pauses_without_rescheduling() {
    let transport = ScriptedTransport::new(body())
        .fail_always_at(1000, ChunkError::expired("HTTP 403"));
    let h = Harness::new(transport);

    let created = h.engine.create(Request::new(URL)).await.unwrap();
    h.wait(&created.id, |e| matches!(e, DownloadEvent::DownloadExpired { .. }))
        .await;

    let expired = h.engine.get(&created.id).await.unwrap();
    assert!(expired.expired);
    assert_eq!(expired.status, DownloadStatus::Paused);
    assert!(expired.check_invariants().is_ok());

    let requests = h.transport.requested_ranges().len();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.transport.requested_ranges().len(), requests);

    // Resuming without a new request is refused.
    assert!(matches!(
        h.engine.start(&created.id).await,
        Err(DownloadError::Conflict { .. })
    ));

    h.transport.clear_failures();
    let resumed = h
        .engine
        .reresolve(&created.id, Request::new(URL))
        .await
        .unwrap();
    assert!(!resumed.expired);
    h.wait(&created.id, is_completed).await;
    assert_eq!(h.storage.finished("data.bin").unwrap(), body());
}

#[tokio::test]
async fn test_cookie_expiry_mid_transfer_marks_expired() {
    let transport = ScriptedTransport::new(body())
        .with_piece_size(100)
        .with_piece_delay(Duration::from_millis(20));
    let h = Harness::build(
        transport,
        config().with_max_chunk_workers(1),
        MemoryEntryRepository::new(),
    );

    let request = Request::new(URL).with_provider("cookie").with_cookie(
        Cookie::new("session", "abc")
            .with_domain("example.com")
            .with_expiration(Utc::now() + chrono::Duration::milliseconds(300)),
    );
    let created = h.engine.create(request).await.unwrap();
    h.wait(&created.id, |e| matches!(e, DownloadEvent::DownloadExpired { .. }))
        .await;

    let download = h.engine.get(&created.id).await.unwrap();
    assert!(download.expired);
    assert_eq!(download.status, DownloadStatus::Paused);
    assert!(download.downloaded_chunks.contains(&0));
    assert!(download.downloaded_chunks.len() < 4);

    let requests = h.transport.requested_ranges().len();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.transport.requested_ranges().len(), requests);
}

#[tokio::test]
async fn test_pause_and_resume_keep_completed_chunks() {
    let transport = ScriptedTransport::new(body())
        .with_piece_size(100)
        .with_piece_delay(Duration::from_millis(10));
    let h = Harness::build(
        transport,
        config().with_max_chunk_workers(1),
        MemoryEntryRepository::new(),
    );

    let created = h.engine.create(Request::new(URL)).await.unwrap();
    h.wait(&created.id, |e| {
        matches!(e, DownloadEvent::ChunkCompleted { index: 0, .. })
    })
    .await;

    let paused = h.engine.pause(&created.id).await.unwrap();
    assert_eq!(paused.status, DownloadStatus::Paused);
    assert!(paused.downloaded_chunks.contains(&0));
    let kept = paused.downloaded_chunks.clone();

    let before = h.transport.requested_ranges().len();
    h.engine.start(&created.id).await.unwrap();
    h.wait(&created.id, is_completed).await;

    let resumed = h.ranges_since(before);
    for index in kept {
        let start = u64::from(index) * 1000;
        assert!(
            resumed.iter().all(|r| r.is_some_and(|r| r.start != start)),
            "chunk {index} was fetched again"
        );
    }
    assert_eq!(h.storage.finished("data.bin").unwrap(), body());
}

#[tokio::test]
async fn test_non_resumable_restarts_from_zero() {
    let transport = ScriptedTransport::new(body())
        .without_ranges()
        .with_piece_size(100)
        .with_piece_delay(Duration::from_millis(10));
    let h = Harness::new(transport);

    let created = h.engine.create(Request::new(URL)).await.unwrap();
    assert!(!created.resumable);
    assert_eq!(created.chunk_len, 1);

    h.wait(&created.id, |e| {
        matches!(e, DownloadEvent::DownloadProgress { progress, .. } if *progress > 0.0)
    })
    .await;

    let paused = h.engine.pause(&created.id).await.unwrap();
    assert_eq!(paused.status, DownloadStatus::Paused);
    assert!(paused.progress.abs() < f64::EPSILON);
    assert!(paused.downloaded_chunks.is_empty());

    h.engine.start(&created.id).await.unwrap();
    h.wait(&created.id, is_completed).await;

    let ranges = h.transport.requested_ranges();
    assert_eq!(ranges, vec![None, None]);
    assert_eq!(h.storage.finished("data.bin").unwrap(), body());
}

#[tokio::test]
async fn test_transient_interruption_resumes_mid_chunk() {
    let transport = ScriptedTransport::new(body())
        .with_piece_size(300)
        .interrupt_once_at(0);
    let h = Harness::new(transport);

    let created = h.engine.create(Request::new(URL)).await.unwrap();
    h.wait(&created.id, is_completed).await;

    let ranges = h.transport.requested_ranges();
    assert_eq!(ranges.len(), 5);
    assert!(ranges.contains(&Some(ByteRange::new(300, 1000))));
    assert_eq!(h.storage.finished("data.bin").unwrap(), body());
}

#[tokio::test]
async fn test_non_ranged_retry_keeps_progress_monotonic() {
    let transport = ScriptedTransport::new(body())
        .without_ranges()
        .with_piece_size(500)
        .interrupt_once_at(0);
    let h = Harness::new(transport);

    let created = h.engine.create(Request::new(URL)).await.unwrap();
    assert_eq!(created.chunk_len, 1);
    h.wait(&created.id, is_completed).await;

    assert_eq!(h.transport.requested_ranges(), vec![None, None]);
    assert_eq!(h.storage.finished("data.bin").unwrap(), body());
    assert_progress_never_decreases(&h.events);
}

#[tokio::test]
async fn test_resumable_hint_rejected_for_unranged_source() {
    let h = Harness::build(
        ScriptedTransport::new(body()).without_ranges(),
        config().with_auto_start(false),
        MemoryEntryRepository::new(),
    );

    let created = h.engine.create(Request::new(URL)).await.unwrap();
    assert!(!created.resumable);
    assert!(!created.accepts_ranges);
    assert_eq!(created.chunk_len, 1);

    assert!(matches!(
        h.engine.update(&created.id, resumable(true), None).await,
        Err(DownloadError::Conflict { .. })
    ));
    let unchanged = h.engine.get(&created.id).await.unwrap();
    assert!(!unchanged.resumable);
    assert_eq!(unchanged.chunk_len, 1);

    let persisted = h.repository.entry(&created.id).unwrap();
    assert!(!persisted.download.accepts_ranges);
}

#[tokio::test]
async fn test_resumable_hint_can_be_restored_for_ranged_source() {
    let h = Harness::build(
        ScriptedTransport::new(body()),
        config().with_auto_start(false),
        MemoryEntryRepository::new(),
    );

    let created = h.engine.create(Request::new(URL)).await.unwrap();
    assert!(created.accepts_ranges);

    let single = h.engine.update(&created.id, resumable(false), None).await.unwrap();
    assert_eq!(single.chunk_len, 1);

    let chunked = h.engine.update(&created.id, resumable(true), None).await.unwrap();
    assert!(chunked.resumable);
    assert_eq!(chunked.chunk_len, 4);
}

#[tokio::test]
async fn test_remove_does_not_block_other_downloads() {
    let h = Harness::build(
        ScriptedTransport::new(body()),
        config().with_auto_start(false),
        MemoryEntryRepository::new(),
    );
    let a = h.engine.create(Request::new(URL)).await.unwrap();
    let b = h.engine.create(Request::new(URL)).await.unwrap();

    let (removed, paused) = tokio::time::timeout(WAIT, async {
        tokio::join!(h.engine.remove(&a.id), h.engine.pause(&b.id))
    })
    .await
    .unwrap();

    assert_eq!(removed.unwrap().id, a.id);
    assert_eq!(paused.unwrap().status, DownloadStatus::Paused);
    assert_eq!(h.engine.page(1).await.entries.len(), 1);
}

#[tokio::test]
async fn test_finalize_failure_marks_failed() {
    let h = Harness::new(ScriptedTransport::new(body()));
    h.storage.fail_finalize(true);

    let created = h.engine.create(Request::new(URL)).await.unwrap();
    h.wait(&created.id, is_failed).await;

    let download = h.engine.get(&created.id).await.unwrap();
    assert_eq!(download.status, DownloadStatus::Failed);
    assert_eq!(download.downloaded_chunks, vec![0, 1, 2, 3]);
    assert!(download.error.unwrap().contains("finish"));
}

#[tokio::test]
async fn test_write_failure_is_fatal() {
    let h = Harness::new(ScriptedTransport::new(body()));
    h.storage.fail_writes(true);

    let created = h.engine.create(Request::new(URL)).await.unwrap();
    h.wait(&created.id, is_failed).await;

    let download = h.engine.get(&created.id).await.unwrap();
    assert_eq!(download.status, DownloadStatus::Failed);
    assert!(download.error.unwrap().contains("disk"));
    // Storage errors are not retried.
    assert!(h.transport.requested_ranges().len() <= 4);
}

#[tokio::test]
async fn test_remove_discards_partial_data() {
    let transport = ScriptedTransport::new(body())
        .with_piece_size(100)
        .with_piece_delay(Duration::from_millis(10));
    let h = Harness::new(transport);

    let created = h.engine.create(Request::new(URL)).await.unwrap();
    h.wait(&created.id, |e| matches!(e, DownloadEvent::ChunkProgress { .. }))
        .await;

    h.engine.remove(&created.id).await.unwrap();
    h.wait(&created.id, |e| matches!(e, DownloadEvent::DownloadRemoved { .. }))
        .await;

    assert!(matches!(
        h.engine.get(&created.id).await,
        Err(DownloadError::NotFound { .. })
    ));
    assert!(h.storage.contents(&created.id).is_none());
    assert!(h.repository.entry(&created.id).is_none());
    assert!(matches!(
        h.engine.pause(&created.id).await,
        Err(DownloadError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_queued_without_auto_start() {
    let h = Harness::build(
        ScriptedTransport::new(body()),
        config().with_auto_start(false),
        MemoryEntryRepository::new(),
    );

    let created = h.engine.create(Request::new(URL)).await.unwrap();
    assert_eq!(created.status, DownloadStatus::Queued);
    assert!(h.transport.requested_ranges().is_empty());

    let page = h.engine.page(1).await;
    assert_eq!(page.entries.len(), 1);
    assert_eq!(page.next_page, None);

    h.engine.start(&created.id).await.unwrap();
    h.wait(&created.id, is_completed).await;
}

#[tokio::test]
async fn test_unknown_provider_is_rejected() {
    let h = Harness::new(ScriptedTransport::new(body()));
    let err = h
        .engine
        .create(Request::new(URL).with_provider("nope"))
        .await
        .unwrap_err();
    assert!(matches!(err, DownloadError::ProviderResolution(_)));
    assert!(h.engine.page(1).await.entries.is_empty());
}

#[tokio::test]
async fn test_restore_pauses_interrupted_downloads() {
    let mut download = Download::from_new(
        DownloadId::new("restored"),
        NewDownload {
            name: "data.bin".into(),
            url: URL.into(),
            provider: "direct".into(),
            size: Some(4000),
            mime_type: "application/octet-stream".into(),
            chunk_len: 4,
            resumable: true,
        },
        Utc::now(),
    );
    download.status = DownloadStatus::Downloading;
    download.record_chunk(0);
    download.record_chunk(1);
    let repository = MemoryEntryRepository::with_entries(vec![StoredEntry {
        seq: 0,
        download,
        request: Request::new(URL),
    }]);

    let h = Harness::build(ScriptedTransport::new(body()), config(), repository);
    assert_eq!(h.engine.restore().await.unwrap(), 1);

    let id = DownloadId::new("restored");
    let restored = h.engine.get(&id).await.unwrap();
    assert_eq!(restored.status, DownloadStatus::Paused);

    h.engine.start(&id).await.unwrap();
    h.wait(&id, is_completed).await;

    let mut ranges = h.transport.requested_ranges();
    ranges.sort_by_key(|r| r.map(|r| r.start));
    assert_eq!(
        ranges,
        vec![Some(ByteRange::new(2000, 3000)), Some(ByteRange::new(3000, 4000))]
    );
}

#[tokio::test]
async fn test_shutdown_persists_paused() {
    let transport = ScriptedTransport::new(body())
        .with_piece_size(100)
        .with_piece_delay(Duration::from_millis(10));
    let h = Harness::new(transport);

    let created = h.engine.create(Request::new(URL)).await.unwrap();
    h.engine.shutdown().await;

    let persisted = h.repository.entry(&created.id).unwrap();
    assert_eq!(persisted.download.status, DownloadStatus::Paused);
    assert!(matches!(
        h.engine.start(&created.id).await,
        Err(DownloadError::NotFound { .. })
    ));
}

mock! {
    Repo {}

    #[async_trait]
    impl EntryRepositoryPort for Repo {
        async fn load_all(&self) -> Result<Vec<StoredEntry>, RepositoryError>;
        async fn save(&self, entry: &StoredEntry) -> Result<(), RepositoryError>;
        async fn remove(&self, id: &DownloadId) -> Result<(), RepositoryError>;
    }
}

#[tokio::test]
async fn test_create_rolls_back_when_persisting_fails() {
    let mut repository = MockRepo::new();
    repository
        .expect_save()
        .times(1)
        .returning(|_| Err(RepositoryError::Storage("disk full".into())));

    let config = config();
    let engine = DownloadEngine::new(EngineDeps {
        transport: Arc::new(ScriptedTransport::new(body())),
        storage: Arc::new(MemoryStorage::new()),
        repository: Arc::new(repository),
        emitter: Arc::new(RecordingEmitter::new()),
        resolver: ProviderResolver::with_builtin(&config),
        config,
    })
    .unwrap();

    let err = engine.create(Request::new(URL)).await.unwrap_err();
    assert!(matches!(err, DownloadError::Repository { .. }));
    assert!(engine.page(1).await.entries.is_empty());
}

#[test]
fn test_zero_connection_budget_rejected() {
    let config = config().with_max_connections(0);
    let result = DownloadEngine::new(EngineDeps {
        transport: Arc::new(ScriptedTransport::new(body())),
        storage: Arc::new(MemoryStorage::new()),
        repository: Arc::new(MemoryEntryRepository::new()),
        emitter: Arc::new(RecordingEmitter::new()),
        resolver: ProviderResolver::with_builtin(&config),
        config,
    });
    assert!(result.is_err());
}
