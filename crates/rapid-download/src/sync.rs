//! Sync service: the client-facing read and write surface.
//!
//! Writes are intents. A requested status is translated into a supervisor
//! transition; engine-owned fields echoed by the client are ignored.

use std::sync::Arc;

use async_trait::async_trait;

use rapid_core::ports::SyncPort;
use rapid_core::{
    BatchOutcome, BatchUpdate, Download, DownloadError, DownloadId, Intent, ItemOutcome, Page,
    Request, UpdateDownload,
};

use crate::engine::DownloadEngine;

/// [`SyncPort`] backed by a [`DownloadEngine`].
#[derive(Clone)]
pub struct SyncService {
    engine: Arc<DownloadEngine>,
}

impl SyncService {
    /// Wrap an engine.
    pub const fn new(engine: Arc<DownloadEngine>) -> Self {
        Self { engine }
    }

    async fn apply(
        &self,
        id: &DownloadId,
        patch: UpdateDownload,
    ) -> Result<Download, DownloadError> {
        let ignored = patch.ignored_fields();
        if !ignored.is_empty() {
            tracing::debug!(
                target: "rapid.sync",
                id = %id,
                fields = ?ignored,
                "Ignoring engine-owned fields in update"
            );
        }

        let current = self.engine.get(id).await?;
        let intent = match patch.status.as_deref() {
            Some(status) => Intent::from_status(status, current.status)?,
            None => None,
        };
        if let Some(intent) = intent {
            tracing::debug!(target: "rapid.sync", id = %id, intent = ?intent, "Applying intent");
        }

        if intent == Some(Intent::Remove) {
            return self.engine.remove(id).await;
        }

        let metadata = UpdateDownload {
            name: patch.name,
            url: patch.url,
            provider: patch.provider,
            resumable: patch.resumable,
            ..UpdateDownload::default()
        };
        self.engine.update(id, metadata, intent).await
    }
}

#[async_trait]
impl SyncPort for SyncService {
    async fn list_page(&self, page: u32) -> Result<Page, DownloadError> {
        Ok(self.engine.page(page).await)
    }

    async fn get(&self, id: &DownloadId) -> Result<Download, DownloadError> {
        self.engine.get(id).await
    }

    async fn create(&self, request: Request) -> Result<Download, DownloadError> {
        self.engine.create(request).await
    }

    async fn batch_update(&self, batch: BatchUpdate) -> BatchOutcome {
        let BatchUpdate { ids, payload } = batch;
        if ids.len() != payload.len() {
            tracing::warn!(
                target: "rapid.sync",
                ids = ids.len(),
                payloads = payload.len(),
                "Batch arrays differ in length"
            );
        }

        let total = ids.len().max(payload.len());
        let mut ids = ids.into_iter();
        let mut payload = payload.into_iter();
        let mut results = Vec::with_capacity(total);

        for index in 0..total {
            let outcome = match (ids.next(), payload.next()) {
                (Some(raw), Some(patch)) => match raw.parse::<DownloadId>() {
                    Ok(id) => match self.apply(&id, patch).await {
                        Ok(_) => ItemOutcome::applied(index, raw),
                        Err(e) => ItemOutcome::rejected(index, Some(raw), &e),
                    },
                    Err(e) => ItemOutcome::rejected(index, Some(raw), &e),
                },
                (Some(raw), None) => ItemOutcome::rejected(
                    index,
                    Some(raw),
                    &DownloadError::invalid_request("no payload for this id"),
                ),
                (None, _) => ItemOutcome::rejected(
                    index,
                    None,
                    &DownloadError::invalid_request("no id for this payload"),
                ),
            };
            results.push(outcome);
        }

        let outcome = BatchOutcome { results };
        let failed = outcome.failed().len();
        if failed > 0 {
            tracing::info!(target: "rapid.sync", total, failed, "Batch applied with failures");
        } else {
            tracing::debug!(target: "rapid.sync", total, "Batch applied");
        }
        outcome
    }

    async fn update(
        &self,
        id: &DownloadId,
        patch: UpdateDownload,
    ) -> Result<Download, DownloadError> {
        self.apply(id, patch).await
    }

    async fn remove(&self, id: &DownloadId) -> Result<(), DownloadError> {
        self.engine.remove(id).await.map(|_| ())
    }

    async fn reresolve(
        &self,
        id: &DownloadId,
        request: Request,
    ) -> Result<Download, DownloadError> {
        self.engine.reresolve(id, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use rapid_core::{ChunkError, DownloadEvent, DownloadStatus, EngineConfig};

    use crate::engine::EngineDeps;
    use crate::provider::ProviderResolver;
    use crate::testing::{MemoryEntryRepository, MemoryStorage, RecordingEmitter, ScriptedTransport};

    fn service() -> (SyncService, RecordingEmitter) {
        service_with(ScriptedTransport::new(vec![7u8; 1000]))
    }

    fn service_with(transport: ScriptedTransport) -> (SyncService, RecordingEmitter) {
        let config = EngineConfig::new("/unused")
            .with_chunk_count(2)
            .with_auto_start(false)
            .with_progress_interval(Duration::ZERO);
        let events = RecordingEmitter::new();
        let engine = DownloadEngine::new(EngineDeps {
            transport: Arc::new(transport),
            storage: Arc::new(MemoryStorage::new()),
            repository: Arc::new(MemoryEntryRepository::new()),
            emitter: Arc::new(events.clone()),
            resolver: ProviderResolver::with_builtin(&config),
            config,
        })
        .unwrap();
        (SyncService::new(Arc::new(engine)), events)
    }

    async fn create(service: &SyncService, name: &str) -> Download {
        service
            .create(Request::new(format!("https://example.com/{name}")))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_batch_applies_valid_items_despite_invalid_id() {
        let (service, _) = service();
        let a = create(&service, "a.bin").await;
        let b = create(&service, "b.bin").await;

        let outcome = service
            .batch_update(BatchUpdate {
                ids: vec![a.id.to_string(), "missing".into(), b.id.to_string()],
                payload: vec![
                    UpdateDownload::status("paused"),
                    UpdateDownload::status("paused"),
                    UpdateDownload {
                        name: Some("renamed.bin".into()),
                        ..UpdateDownload::default()
                    },
                ],
            })
            .await;

        assert!(!outcome.all_succeeded());
        let failed = outcome.failed();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].index, 1);
        assert_eq!(failed[0].id.as_deref(), Some("missing"));

        assert_eq!(service.get(&a.id).await.unwrap().status, DownloadStatus::Paused);
        assert_eq!(service.get(&b.id).await.unwrap().name, "renamed.bin");
    }

    #[tokio::test]
    async fn test_batch_reports_length_mismatch_per_item() {
        let (service, _) = service();
        let a = create(&service, "a.bin").await;

        let outcome = service
            .batch_update(BatchUpdate {
                ids: vec![a.id.to_string(), "extra".into()],
                payload: vec![UpdateDownload::status("paused")],
            })
            .await;

        assert_eq!(outcome.results.len(), 2);
        assert!(outcome.results[0].ok);
        assert!(!outcome.results[1].ok);
    }

    #[tokio::test]
    async fn test_echoed_engine_fields_are_ignored() {
        let (service, _) = service();
        let a = create(&service, "a.bin").await;

        let patch = UpdateDownload {
            progress: Some(99.0),
            downloaded_chunks: Some(vec![0, 1]),
            expired: Some(true),
            ..UpdateDownload::default()
        };
        let updated = service.update(&a.id, patch).await.unwrap();
        assert!(updated.progress.abs() < f64::EPSILON);
        assert!(updated.downloaded_chunks.is_empty());
        assert!(!updated.expired);
    }

    #[tokio::test]
    async fn test_status_intents_drive_transitions() {
        let (service, events) = service();
        let a = create(&service, "a.bin").await;

        assert!(matches!(
            service.update(&a.id, UpdateDownload::status("completed")).await,
            Err(DownloadError::InvalidRequest { .. })
        ));

        let running = service
            .update(&a.id, UpdateDownload::status("downloading"))
            .await
            .unwrap();
        assert_eq!(running.status, DownloadStatus::Downloading);

        let id = a.id.to_string();
        events
            .wait_for(
                move |e| e.id() == id && matches!(e, DownloadEvent::DownloadCompleted { .. }),
                Duration::from_secs(10),
            )
            .await
            .unwrap();

        assert!(matches!(
            service.update(&a.id, UpdateDownload::status("paused")).await,
            Err(DownloadError::Conflict { .. })
        ));
        let echoed = service
            .update(&a.id, UpdateDownload::status("completed"))
            .await
            .unwrap();
        assert_eq!(echoed.status, DownloadStatus::Completed);

        service
            .update(&a.id, UpdateDownload::status("cancelled"))
            .await
            .unwrap();
        assert!(matches!(
            service.get(&a.id).await,
            Err(DownloadError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_refused_intent_leaves_metadata_untouched() {
        let transport = ScriptedTransport::new(vec![7u8; 1000])
            .fail_always_at(0, ChunkError::expired("HTTP 403"));
        let (service, events) = service_with(transport);
        let a = create(&service, "a.bin").await;
        service
            .update(&a.id, UpdateDownload::status("downloading"))
            .await
            .unwrap();

        let id = a.id.to_string();
        events
            .wait_for(
                move |e| e.id() == id && matches!(e, DownloadEvent::DownloadExpired { .. }),
                Duration::from_secs(10),
            )
            .await
            .unwrap();

        let outcome = service
            .batch_update(BatchUpdate {
                ids: vec![a.id.to_string()],
                payload: vec![UpdateDownload {
                    name: Some("renamed.bin".into()),
                    status: Some("downloading".into()),
                    ..UpdateDownload::default()
                }],
            })
            .await;

        assert!(!outcome.results[0].ok);
        let after = service.get(&a.id).await.unwrap();
        assert_eq!(after.name, "a.bin");
        assert!(after.expired);
        assert_eq!(after.status, DownloadStatus::Paused);
    }

    #[tokio::test]
    async fn test_list_page_in_creation_order() {
        let (service, _) = service();
        let a = create(&service, "a.bin").await;
        let b = create(&service, "b.bin").await;

        let page = service.list_page(1).await.unwrap();
        let map = page.into_map();
        let ids: Vec<&String> = map.keys().collect();
        assert_eq!(ids, vec![&a.id.to_string(), &b.id.to_string()]);
    }
}
