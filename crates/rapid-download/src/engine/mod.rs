//! Download engine.
//!
//! Owns the registry and one supervisor per download. Every write to a
//! download is funneled through its supervisor; reads come straight from the
//! registry.

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use url::Url;

use rapid_core::ports::{
    ChunkStorage, DownloadEventEmitterPort, EntryRepositoryPort, TransferPort,
};
use rapid_core::{
    Download, DownloadError, DownloadEvent, DownloadId, EngineConfig, Intent, NewDownload, Page,
    Request, UpdateDownload,
};

use crate::budget::ConnectionBudget;
use crate::chunk::WorkerDeps;
use crate::planner;
use crate::provider::ProviderResolver;
use crate::registry::Registry;
use crate::supervisor::{self, Command, SupervisorHandle};

const FALLBACK_NAME: &str = "download";
const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// Collaborators the engine is built from.
pub struct EngineDeps {
    /// Network side.
    pub transport: Arc<dyn TransferPort>,
    /// Partial and finished file storage.
    pub storage: Arc<dyn ChunkStorage>,
    /// Durable registry.
    pub repository: Arc<dyn EntryRepositoryPort>,
    /// Event sink.
    pub emitter: Arc<dyn DownloadEventEmitterPort>,
    /// Provider registry.
    pub resolver: ProviderResolver,
    /// Engine configuration.
    pub config: EngineConfig,
}

/// State shared between the engine and its supervisors.
pub(crate) struct EngineContext {
    pub(crate) registry: Registry,
    pub(crate) repository: Arc<dyn EntryRepositoryPort>,
    pub(crate) emitter: Arc<dyn DownloadEventEmitterPort>,
    pub(crate) resolver: ProviderResolver,
    pub(crate) config: EngineConfig,
    pub(crate) workers: WorkerDeps,
}

/// Resumable, chunked, multi-provider download engine.
pub struct DownloadEngine {
    ctx: Arc<EngineContext>,
    supervisors: RwLock<HashMap<DownloadId, SupervisorHandle>>,
}

impl DownloadEngine {
    /// Build an engine. Fails when the connection budget is zero.
    pub fn new(deps: EngineDeps) -> Result<Self, DownloadError> {
        let budget = ConnectionBudget::new(deps.config.max_connections)?;
        let workers = WorkerDeps {
            transport: deps.transport,
            storage: deps.storage,
            budget,
            progress_interval: deps.config.progress_interval,
            progress_byte_threshold: deps.config.progress_byte_threshold,
        };
        Ok(Self {
            ctx: Arc::new(EngineContext {
                registry: Registry::new(),
                repository: deps.repository,
                emitter: deps.emitter,
                resolver: deps.resolver,
                config: deps.config,
                workers,
            }),
            supervisors: RwLock::new(HashMap::new()),
        })
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.ctx.config
    }

    /// Load persisted downloads and spawn their supervisors.
    ///
    /// Nothing is started automatically; downloads that were transferring
    /// come back paused.
    pub async fn restore(&self) -> Result<usize, DownloadError> {
        let entries = self.ctx.repository.load_all().await?;
        let loaded = self.ctx.registry.load(entries).await;

        let mut supervisors = self.supervisors.write().await;
        let mut restored = 0;
        for entry in loaded {
            if supervisors.contains_key(&entry.download.id) {
                continue;
            }
            let id = entry.download.id.clone();
            supervisors.insert(id, SupervisorHandle::spawn(Arc::clone(&self.ctx), entry));
            restored += 1;
        }

        tracing::info!(target: "rapid.download", restored, "Restored persisted downloads");
        Ok(restored)
    }

    /// Accept a new transfer request.
    ///
    /// Resolves the provider, probes the resource, plans chunks and registers
    /// a queued download. With `auto_start` the transfer begins immediately.
    pub async fn create(&self, request: Request) -> Result<Download, DownloadError> {
        let resolution = self.ctx.resolver.resolve(&request).await?;
        let info = self
            .ctx
            .workers
            .transport
            .probe(&resolution.template)
            .await?;

        let ranged = resolution.template.supports_ranges && info.accepts_ranges;
        let preferred = request
            .chunks
            .unwrap_or(self.ctx.config.preferred_chunk_count);
        let plan = planner::plan(info.size, ranged, preferred);

        let name = info
            .file_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| name_from_url(info.final_url.as_ref().unwrap_or(&resolution.template.url)))
            .unwrap_or_else(|| FALLBACK_NAME.to_string());
        let mime_type = request
            .mime_type
            .clone()
            .or(info.mime_type)
            .unwrap_or_else(|| FALLBACK_MIME_TYPE.to_string());

        let mut download = Download::from_new(
            DownloadId::generate(),
            NewDownload {
                name,
                url: resolution.request.url.clone(),
                provider: resolution.template.provider.clone(),
                size: info.size,
                mime_type,
                chunk_len: plan.len(),
                resumable: plan.resumable,
            },
            Utc::now(),
        );
        download.accepts_ranges = ranged;
        let id = download.id.clone();

        let entry = self
            .ctx
            .registry
            .insert(download.clone(), resolution.request)
            .await;
        if let Err(e) = self.ctx.repository.save(&entry).await {
            self.ctx.registry.remove(&id).await;
            return Err(e.into());
        }

        tracing::info!(
            target: "rapid.download",
            id = %id,
            name = %download.name,
            size = download.size,
            chunks = download.chunk_len,
            resumable = download.resumable,
            "Download created"
        );
        self.ctx.emitter.emit(DownloadEvent::created(download.clone()));

        self.supervisors.write().await.insert(
            id.clone(),
            SupervisorHandle::spawn(Arc::clone(&self.ctx), entry),
        );

        if self.ctx.config.auto_start {
            return self.start(&id).await;
        }
        Ok(download)
    }

    /// Snapshot of one download.
    pub async fn get(&self, id: &DownloadId) -> Result<Download, DownloadError> {
        self.ctx
            .registry
            .get(id)
            .await
            .ok_or_else(|| DownloadError::not_found(id.as_str()))
    }

    /// One page of downloads in creation order.
    pub async fn page(&self, page: u32) -> Page {
        self.ctx.registry.page(page, self.ctx.config.page_size).await
    }

    /// Start, resume or retry a download.
    pub async fn start(&self, id: &DownloadId) -> Result<Download, DownloadError> {
        let tx = self.sender(id).await?;
        supervisor::call(&tx, Command::Start).await
    }

    /// Pause a download, keeping completed chunks.
    pub async fn pause(&self, id: &DownloadId) -> Result<Download, DownloadError> {
        let tx = self.sender(id).await?;
        supervisor::call(&tx, Command::Pause).await
    }

    /// Apply client-editable metadata and an optional pause or resume intent.
    ///
    /// Nothing is committed unless the whole update is accepted.
    pub async fn update(
        &self,
        id: &DownloadId,
        patch: UpdateDownload,
        intent: Option<Intent>,
    ) -> Result<Download, DownloadError> {
        let tx = self.sender(id).await?;
        supervisor::call(&tx, |reply| Command::Update(patch, intent, reply)).await
    }

    /// Replace a download's request, clearing expiry and resuming if needed.
    pub async fn reresolve(
        &self,
        id: &DownloadId,
        request: Request,
    ) -> Result<Download, DownloadError> {
        let tx = self.sender(id).await?;
        supervisor::call(&tx, |reply| Command::Reresolve(request, reply)).await
    }

    /// Remove a download and discard its partial data.
    ///
    /// Returns the last snapshot.
    pub async fn remove(&self, id: &DownloadId) -> Result<Download, DownloadError> {
        let tx = self.sender(id).await?;
        let snapshot = supervisor::call(&tx, Command::Remove).await?;
        let handle = self.supervisors.write().await.remove(id);
        if let Some(handle) = handle {
            handle.join().await;
        }
        Ok(snapshot)
    }

    /// Stop every supervisor. Transferring downloads are persisted as paused.
    pub async fn shutdown(&self) {
        let handles: Vec<SupervisorHandle> = self
            .supervisors
            .write()
            .await
            .drain()
            .map(|(_, handle)| handle)
            .collect();
        let count = handles.len();
        for handle in handles {
            handle.shutdown().await;
        }
        tracing::info!(target: "rapid.download", supervisors = count, "Download engine stopped");
    }

    async fn sender(
        &self,
        id: &DownloadId,
    ) -> Result<tokio::sync::mpsc::Sender<Command>, DownloadError> {
        self.supervisors
            .read()
            .await
            .get(id)
            .map(SupervisorHandle::sender)
            .ok_or_else(|| DownloadError::not_found(id.as_str()))
    }
}

/// Last non-empty path segment of a URL.
fn name_from_url(url: &Url) -> Option<String> {
    url.path_segments()?
        .rev()
        .find(|segment| !segment.is_empty())
        .map(str::to_string)
}
