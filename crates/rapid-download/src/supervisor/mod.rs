//! Download supervisor: one actor per download.
//!
//! The supervisor is the single writer of its `Download`. It receives commands
//! from the engine and messages from its chunk workers over channels, advances
//! the [`ChunkBook`], and commits snapshots to the registry.
//!
//! # Concurrency Model
//!
//! - Commands and worker messages are handled one at a time in `run`
//! - Workers get value-type jobs and cloned `Arc` dependencies
//! - Pause uses a fresh `CancellationToken` per transfer; removal a separate one
//! - Stopping waits for workers up to `cancel_grace`, then aborts them
//! - Lease ids keep late messages from earlier attempts out of the book

mod book;

pub use book::{ChunkBook, Decision};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use rapid_core::ports::StoredEntry;
use rapid_core::{
    Download, DownloadError, DownloadEvent, DownloadStatus, Intent, Request, RequestTemplate,
    UpdateDownload,
};

use crate::chunk::{self, ChunkJob, ChunkSignals, Lease, WorkerMessage};
use crate::engine::EngineContext;
use crate::planner;
use crate::progress::{SpeedMeter, time_left};
use crate::provider::Resolution;

const COMMAND_CAPACITY: usize = 32;
const INBOX_CAPACITY: usize = 256;

type Reply = oneshot::Sender<Result<Download, DownloadError>>;

/// Request sent to a supervisor.
pub enum Command {
    /// Start, resume or retry the transfer.
    Start(Reply),
    /// Stop workers, keep completed chunks.
    Pause(Reply),
    /// Apply client-editable metadata, then an optional pause or resume intent.
    Update(UpdateDownload, Option<Intent>, Reply),
    /// Replace the request after expiry or failure.
    Reresolve(Request, Reply),
    /// Delete the download and its partial data.
    Remove(Reply),
    /// Stop workers and exit, keeping state.
    Shutdown(oneshot::Sender<()>),
}

/// Engine-side handle to a running supervisor.
pub struct SupervisorHandle {
    tx: mpsc::Sender<Command>,
    task: JoinHandle<()>,
}

impl SupervisorHandle {
    /// Spawn a supervisor for a registered entry.
    pub fn spawn(ctx: Arc<EngineContext>, entry: StoredEntry) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
        let supervisor = Supervisor::new(ctx, entry);
        let task = tokio::spawn(supervisor.run(rx));
        Self { tx, task }
    }

    /// Command sender for this supervisor.
    pub fn sender(&self) -> mpsc::Sender<Command> {
        self.tx.clone()
    }

    /// Ask the supervisor to stop and wait for it to exit.
    pub async fn shutdown(self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(Command::Shutdown(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
        let _ = self.task.await;
    }

    /// Wait for a supervisor that is already exiting.
    pub async fn join(self) {
        drop(self.tx);
        let _ = self.task.await;
    }
}

/// Send a command and wait for its reply.
pub async fn call(
    tx: &mpsc::Sender<Command>,
    make: impl FnOnce(Reply) -> Command,
) -> Result<Download, DownloadError> {
    let (reply_tx, reply_rx) = oneshot::channel();
    tx.send(make(reply_tx))
        .await
        .map_err(|_| DownloadError::unavailable("download supervisor has stopped"))?;
    reply_rx
        .await
        .map_err(|_| DownloadError::unavailable("download supervisor has stopped"))?
}

enum Event {
    Command(Command),
    Closed,
    Worker(WorkerMessage),
    Wake,
}

struct Supervisor {
    ctx: Arc<EngineContext>,
    download: Download,
    request: Request,
    template: Option<RequestTemplate>,
    book: ChunkBook,
    speed: SpeedMeter,
    active: HashMap<u32, (Lease, JoinHandle<()>)>,
    run_token: CancellationToken,
    cancel_token: CancellationToken,
    inbox_tx: mpsc::Sender<WorkerMessage>,
    inbox_rx: mpsc::Receiver<WorkerMessage>,
    next_lease: u64,
}

impl Supervisor {
    fn new(ctx: Arc<EngineContext>, entry: StoredEntry) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::channel(INBOX_CAPACITY);
        let book = ChunkBook::from_download(&entry.download);
        let speed = SpeedMeter::new(ctx.config.speed_smoothing);
        Self {
            ctx,
            download: entry.download,
            request: entry.request,
            template: None,
            book,
            speed,
            active: HashMap::new(),
            run_token: CancellationToken::new(),
            cancel_token: CancellationToken::new(),
            inbox_tx,
            inbox_rx,
            next_lease: 0,
        }
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        tracing::debug!(target: "rapid.download", id = %self.download.id, "Supervisor started");

        loop {
            let wake = self.pending_wake();
            let event = tokio::select! {
                biased;
                cmd = commands.recv() => cmd.map_or(Event::Closed, Event::Command),
                Some(msg) = self.inbox_rx.recv() => Event::Worker(msg),
                () = tokio::time::sleep_until(
                    tokio::time::Instant::from_std(wake.unwrap_or_else(Instant::now))
                ), if wake.is_some() => Event::Wake,
            };

            let keep_running = match event {
                Event::Command(cmd) => self.handle_command(cmd).await,
                Event::Closed => {
                    self.stop_for_shutdown().await;
                    false
                }
                Event::Worker(msg) => {
                    self.on_worker_message(msg).await;
                    true
                }
                Event::Wake => true,
            };
            if !keep_running {
                break;
            }

            if self.download.status == DownloadStatus::Downloading {
                self.schedule().await;
                self.maybe_finalize().await;
            }
        }

        tracing::debug!(target: "rapid.download", id = %self.download.id, "Supervisor exited");
    }

    fn pending_wake(&self) -> Option<Instant> {
        if self.download.status == DownloadStatus::Downloading {
            self.book.next_wake()
        } else {
            None
        }
    }

    async fn handle_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Start(reply) => {
                let result = self.start().await;
                let _ = reply.send(result);
            }
            Command::Pause(reply) => {
                let result = self.pause().await;
                let _ = reply.send(result);
            }
            Command::Update(patch, intent, reply) => {
                let result = self.update(patch, intent).await;
                let _ = reply.send(result);
            }
            Command::Reresolve(request, reply) => {
                let result = self.reresolve(request).await;
                let _ = reply.send(result);
            }
            Command::Remove(reply) => {
                let snapshot = self.remove().await;
                let _ = reply.send(Ok(snapshot));
                return false;
            }
            Command::Shutdown(ack) => {
                self.stop_for_shutdown().await;
                let _ = ack.send(());
                return false;
            }
        }
        true
    }

    // ---- transitions -------------------------------------------------------

    async fn start(&mut self) -> Result<Download, DownloadError> {
        match self.download.status {
            DownloadStatus::Downloading => return Ok(self.download.clone()),
            DownloadStatus::Completed => {
                return Err(DownloadError::conflict("download is already completed"));
            }
            _ if self.download.expired => {
                return Err(DownloadError::conflict(
                    "download link expired; re-resolve it before resuming",
                ));
            }
            _ => {}
        }

        self.book.reset_attempts();
        self.begin_transfer().await;
        Ok(self.download.clone())
    }

    /// Resolve if needed, prepare storage and switch to `downloading`.
    async fn begin_transfer(&mut self) {
        if self.template.is_none() || self.template_stale() {
            match self.ctx.resolver.resolve(&self.request).await {
                Ok(resolution) => self.install(resolution),
                Err(err) if err.is_auth() => {
                    self.mark_expired(err.to_string()).await;
                    return;
                }
                Err(err) => {
                    self.mark_failed(&DownloadError::from(err)).await;
                    return;
                }
            }
        }

        let id = self.download.id.clone();
        let storage = Arc::clone(&self.ctx.workers.storage);

        if !self.book.is_ranged() {
            self.book.reset_all();
            self.download.downloaded_chunks.clear();
            self.download.progress = 0.0;
            if let Err(e) = storage.truncate(&id).await {
                self.mark_failed(&DownloadError::Storage(e)).await;
                return;
            }
        }
        if let Err(e) = storage.prepare(&id, self.download.known_size()).await {
            self.mark_failed(&DownloadError::Storage(e)).await;
            return;
        }

        self.run_token = CancellationToken::new();
        self.speed.reset();
        self.download.status = DownloadStatus::Downloading;
        self.download.error = None;
        self.download.speed = 0.0;
        self.download.time_left = None;
        self.persist().await;

        tracing::info!(
            target: "rapid.download",
            id = %id,
            chunks = self.download.chunk_len,
            completed = self.download.downloaded_chunks.len(),
            "Download started"
        );
        self.ctx
            .emitter
            .emit(DownloadEvent::started(id.as_str(), self.download.chunk_len));
    }

    async fn pause(&mut self) -> Result<Download, DownloadError> {
        match self.download.status {
            DownloadStatus::Paused => Ok(self.download.clone()),
            DownloadStatus::Queued | DownloadStatus::Downloading => {
                self.halt(None).await;
                Ok(self.download.clone())
            }
            status => Err(DownloadError::conflict(format!(
                "cannot pause a {status} download"
            ))),
        }
    }

    /// Validate the whole update against live state before committing any of it.
    async fn update(
        &mut self,
        patch: UpdateDownload,
        intent: Option<Intent>,
    ) -> Result<Download, DownloadError> {
        match intent {
            Some(Intent::Pause) => match self.download.status {
                DownloadStatus::Queued | DownloadStatus::Downloading | DownloadStatus::Paused => {}
                status => {
                    return Err(DownloadError::conflict(format!(
                        "cannot pause a {status} download"
                    )));
                }
            },
            Some(Intent::Resume) => {
                if self.download.status == DownloadStatus::Completed {
                    return Err(DownloadError::conflict("download is already completed"));
                }
                if self.download.expired && !patch.touches_source() {
                    return Err(DownloadError::conflict(
                        "download link expired; re-resolve it before resuming",
                    ));
                }
            }
            Some(Intent::Remove) => {
                return Err(DownloadError::invalid_request(
                    "removal cannot be combined with an update",
                ));
            }
            None => {}
        }

        let mut snapshot = self.patch(patch).await?;
        match intent {
            Some(Intent::Pause) => snapshot = self.pause().await?,
            Some(Intent::Resume) => snapshot = self.start().await?,
            _ => {}
        }
        Ok(snapshot)
    }

    async fn patch(&mut self, patch: UpdateDownload) -> Result<Download, DownloadError> {
        let name = match patch.name.as_deref().map(str::trim) {
            Some("") => return Err(DownloadError::invalid_request("name cannot be empty")),
            other => other.map(str::to_string),
        };

        let mut source = None;
        if patch.touches_source() {
            let mut request = self.request.clone();
            if let Some(url) = patch.url {
                request.url = url;
            }
            if let Some(provider) = patch.provider {
                request.provider = provider;
            }
            if request.url != self.request.url || request.provider != self.request.provider {
                if self.download.status == DownloadStatus::Downloading {
                    return Err(DownloadError::conflict(
                        "pause the download before changing its source",
                    ));
                }
                source = Some(self.ctx.resolver.resolve(&request).await?);
            }
        }

        let replan = match patch.resumable {
            Some(resumable) if resumable != self.download.resumable => {
                if self.download.status != DownloadStatus::Queued || self.book.bytes_done() > 0 {
                    return Err(DownloadError::conflict(
                        "resumability can only change before the transfer starts",
                    ));
                }
                let provider_ranges = match &source {
                    Some(resolution) => resolution.template.supports_ranges,
                    None => self.provider_supports_ranges(),
                };
                let ranged = self.download.accepts_ranges && provider_ranges;
                if resumable && (!ranged || self.download.known_size().is_none()) {
                    return Err(DownloadError::conflict(
                        "the source does not support ranged requests",
                    ));
                }
                Some(resumable)
            }
            _ => None,
        };
        if replan.is_none() && source.is_none() && name.is_none() {
            return Ok(self.download.clone());
        }

        if let Some(resumable) = replan {
            let preferred = self
                .request
                .chunks
                .unwrap_or(self.ctx.config.preferred_chunk_count);
            let plan = planner::plan(self.download.known_size(), resumable, preferred);
            self.download.resumable = plan.resumable;
            self.download.chunk_len = plan.len();
            self.download.downloaded_chunks.clear();
            self.book = ChunkBook::from_download(&self.download);
        }
        if let Some(resolution) = source {
            self.install(resolution);
            self.download.expired = false;
            self.download.error = None;
        }
        if let Some(name) = name {
            self.download.name = name;
        }

        self.persist().await;
        Ok(self.download.clone())
    }

    async fn reresolve(&mut self, request: Request) -> Result<Download, DownloadError> {
        match self.download.status {
            DownloadStatus::Downloading => {
                return Err(DownloadError::conflict(
                    "download is transferring; pause it before re-resolving",
                ));
            }
            DownloadStatus::Completed => {
                return Err(DownloadError::conflict("download is already completed"));
            }
            _ => {}
        }

        let resume = self.download.expired || self.download.status == DownloadStatus::Failed;
        let resolution = self.ctx.resolver.resolve(&request).await?;
        self.install(resolution);
        self.download.expired = false;
        self.download.error = None;

        tracing::info!(
            target: "rapid.download",
            id = %self.download.id,
            provider = %self.download.provider,
            "Download re-resolved"
        );

        if resume {
            self.book.reset_attempts();
            self.begin_transfer().await;
        } else {
            self.persist().await;
        }
        Ok(self.download.clone())
    }

    async fn remove(&mut self) -> Download {
        self.stop_workers(true).await;

        let id = self.download.id.clone();
        if let Err(e) = self.ctx.workers.storage.discard(&id).await {
            tracing::warn!(target: "rapid.download", id = %id, error = %e, "Failed to discard partial data");
        }
        self.ctx.registry.remove(&id).await;
        if let Err(e) = self.ctx.repository.remove(&id).await {
            tracing::debug!(target: "rapid.download", id = %id, error = %e, "Entry was not persisted");
        }

        tracing::info!(target: "rapid.download", id = %id, "Download removed");
        self.ctx.emitter.emit(DownloadEvent::removed(id.as_str()));
        self.download.clone()
    }

    async fn stop_for_shutdown(&mut self) {
        if self.download.status == DownloadStatus::Downloading {
            self.stop_workers(false).await;
            self.download.status = DownloadStatus::Paused;
            self.clear_rate();
            self.persist().await;
        }
    }

    /// Stop workers and move to `paused`, optionally flagging expiry.
    async fn halt(&mut self, expired: Option<String>) {
        self.stop_workers(false).await;

        self.download.status = DownloadStatus::Paused;
        self.clear_rate();
        if !self.book.is_ranged() {
            self.book.reset_all();
            self.download.downloaded_chunks.clear();
            self.download.progress = 0.0;
        }

        let id = self.download.id.clone();
        match expired {
            Some(reason) => {
                self.template = None;
                self.download.expired = true;
                self.download.error = Some(reason.clone());
                self.persist().await;
                tracing::warn!(target: "rapid.download", id = %id, reason = %reason, "Download link expired");
                self.ctx.emitter.emit(DownloadEvent::DownloadExpired {
                    id: id.to_string(),
                    reason,
                });
            }
            None => {
                self.persist().await;
                tracing::info!(target: "rapid.download", id = %id, "Download paused");
                self.ctx.emitter.emit(DownloadEvent::paused(id.as_str()));
            }
        }
    }

    async fn mark_expired(&mut self, reason: String) {
        self.halt(Some(reason)).await;
    }

    async fn mark_failed(&mut self, err: &DownloadError) {
        self.stop_workers(false).await;

        self.download.status = DownloadStatus::Failed;
        self.download.error = Some(err.user_message());
        self.clear_rate();
        self.persist().await;

        let id = self.download.id.clone();
        tracing::warn!(target: "rapid.download", id = %id, error = %err, "Download failed");
        self.ctx
            .emitter
            .emit(DownloadEvent::failed(id.as_str(), err.user_message()));
    }

    async fn maybe_finalize(&mut self) {
        if self.download.status != DownloadStatus::Downloading
            || !self.active.is_empty()
            || !self.book.all_done()
        {
            return;
        }

        let id = self.download.id.clone();
        let result = self
            .ctx
            .workers
            .storage
            .finalize(&id, &self.download.name, self.download.known_size())
            .await;

        match result {
            Ok(path) => {
                self.download.status = DownloadStatus::Completed;
                self.download.progress = 100.0;
                self.clear_rate();
                self.persist().await;
                let path = path.display().to_string();
                tracing::info!(target: "rapid.download", id = %id, path = %path, "Download completed");
                self.ctx
                    .emitter
                    .emit(DownloadEvent::DownloadCompleted { id: id.to_string(), path });
            }
            Err(e) => {
                self.mark_failed(&DownloadError::finalize(e.to_string())).await;
            }
        }
    }

    // ---- workers -----------------------------------------------------------

    async fn schedule(&mut self) {
        let ready = self
            .book
            .ready(Instant::now(), self.ctx.config.max_chunk_workers);
        if ready.is_empty() {
            return;
        }

        if self.template.is_none() || self.template_stale() {
            match self.ctx.resolver.resolve(&self.request).await {
                Ok(resolution) => self.install(resolution),
                Err(err) if err.is_auth() => {
                    self.mark_expired(err.to_string()).await;
                    return;
                }
                Err(err) => {
                    self.mark_failed(&DownloadError::from(err)).await;
                    return;
                }
            }
        }
        let Some(template) = self.template.clone() else {
            return;
        };

        let ranged = self.book.is_ranged();
        for index in ready {
            if !ranged && self.book.chunk(index).is_some_and(|c| c.transferred > 0) {
                // A whole-resource stream cannot continue mid-way.
                if let Err(e) = self.ctx.workers.storage.truncate(&self.download.id).await {
                    self.mark_failed(&DownloadError::Storage(e)).await;
                    return;
                }
                self.book.reset_chunk(index);
            }

            self.next_lease += 1;
            let lease = Lease(self.next_lease);
            let Some(assignment) = self.book.begin(index, lease) else {
                continue;
            };

            tracing::trace!(
                target: "rapid.download",
                id = %self.download.id,
                chunk = index,
                attempt = assignment.attempts + 1,
                "Scheduling chunk"
            );

            let job = ChunkJob {
                assignment,
                lease,
                template: template.clone(),
                ranged,
            };
            let signals = ChunkSignals {
                pause: self.run_token.clone(),
                cancel: self.cancel_token.clone(),
            };
            let handle = tokio::spawn(chunk::run_chunk(
                job,
                self.ctx.workers.clone(),
                signals,
                self.inbox_tx.clone(),
            ));
            self.active.insert(index, (lease, handle));
        }
    }

    async fn on_worker_message(&mut self, msg: WorkerMessage) {
        match msg {
            WorkerMessage::Progress {
                index,
                lease,
                transferred,
            } => {
                if self.book.progress(index, lease, transferred) {
                    self.publish_progress(index).await;
                }
            }
            WorkerMessage::Finished {
                index,
                lease,
                transferred,
                outcome,
            } => {
                self.release(index, lease);
                let decision = self.book.finish(
                    index,
                    lease,
                    transferred,
                    outcome,
                    Instant::now(),
                    &self.ctx.config,
                );
                self.apply(index, decision).await;
            }
        }
    }

    async fn apply(&mut self, index: u32, decision: Decision) {
        let id = self.download.id.clone();
        match decision {
            Decision::Stale | Decision::Stopped => {}
            Decision::ChunkDone => {
                self.download.record_chunk(index);
                self.publish_progress(index).await;
                self.ctx.emitter.emit(DownloadEvent::ChunkCompleted {
                    id: id.to_string(),
                    index,
                });
                self.persist().await;
            }
            Decision::Retry { attempt, delay } => {
                tracing::warn!(
                    target: "rapid.download",
                    id = %id,
                    chunk = index,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "Chunk failed, retrying"
                );
            }
            Decision::Expired(reason) => {
                if self.download.status == DownloadStatus::Downloading {
                    self.mark_expired(reason).await;
                }
            }
            Decision::Fatal(err) => {
                if self.download.status == DownloadStatus::Downloading {
                    self.mark_failed(&DownloadError::from(err)).await;
                }
            }
            Decision::Exhausted(err) => {
                if self.download.status == DownloadStatus::Downloading {
                    tracing::warn!(
                        target: "rapid.download",
                        id = %id,
                        chunk = index,
                        "Chunk exhausted its retries"
                    );
                    self.mark_failed(&DownloadError::from(err)).await;
                }
            }
        }
    }

    fn release(&mut self, index: u32, lease: Lease) {
        if self.active.get(&index).is_some_and(|(l, _)| *l == lease) {
            self.active.remove(&index);
        }
    }

    /// Signal workers and wait for them, aborting any that outlive the grace period.
    async fn stop_workers(&mut self, removing: bool) {
        if removing {
            self.cancel_token.cancel();
        } else {
            self.run_token.cancel();
        }

        let deadline = tokio::time::Instant::now() + self.ctx.config.cancel_grace;
        while !self.active.is_empty() {
            match tokio::time::timeout_at(deadline, self.inbox_rx.recv()).await {
                Ok(Some(WorkerMessage::Progress {
                    index,
                    lease,
                    transferred,
                })) => {
                    self.book.progress(index, lease, transferred);
                }
                Ok(Some(WorkerMessage::Finished {
                    index,
                    lease,
                    transferred,
                    outcome,
                })) => {
                    self.release(index, lease);
                    let decision = self.book.finish(
                        index,
                        lease,
                        transferred,
                        outcome,
                        Instant::now(),
                        &self.ctx.config,
                    );
                    if decision == Decision::ChunkDone {
                        self.download.record_chunk(index);
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    for (index, (_, handle)) in self.active.drain() {
                        tracing::warn!(
                            target: "rapid.download",
                            id = %self.download.id,
                            chunk = index,
                            "Chunk worker ignored cancellation, aborting"
                        );
                        handle.abort();
                        self.book.abandon(index);
                    }
                    break;
                }
            }
        }
    }

    // ---- state -------------------------------------------------------------

    fn install(&mut self, resolution: Resolution) {
        self.download.url.clone_from(&resolution.request.url);
        self.download.provider.clone_from(&resolution.template.provider);
        self.request = resolution.request;
        self.template = Some(resolution.template);
    }

    fn provider_supports_ranges(&self) -> bool {
        if let Some(template) = &self.template {
            return template.supports_ranges;
        }
        let name = self.ctx.resolver.provider_name(&self.request);
        self.ctx
            .resolver
            .get(name)
            .is_ok_and(|provider| provider.supports_ranges())
    }

    fn template_stale(&self) -> bool {
        let now = Utc::now();
        self.template
            .as_ref()
            .is_some_and(|t| t.cookies.iter().any(|c| c.is_expired(now)))
    }

    fn clear_rate(&mut self) {
        self.speed.reset();
        self.download.speed = 0.0;
        self.download.time_left = None;
    }

    fn computed_progress(&self) -> f64 {
        let progress = match self.download.known_size() {
            Some(size) => self.book.bytes_done() as f64 / size as f64 * 100.0,
            None if self.book.is_empty() => 0.0,
            None => self.book.completed_count() as f64 / self.book.len() as f64 * 100.0,
        };
        progress.clamp(0.0, 100.0)
    }

    /// Recompute aggregate progress and publish it.
    async fn publish_progress(&mut self, index: u32) {
        let done = self.book.bytes_done();
        let speed = self.speed.sample(done, Instant::now());
        let progress = self.computed_progress();

        // Progress never moves backwards while transferring.
        self.download.progress = self.download.progress.max(progress);
        self.download.speed = speed;
        self.download.time_left = self
            .download
            .known_size()
            .and_then(|size| time_left(size.saturating_sub(done), speed));
        self.ctx.registry.commit(&self.download).await;

        let id = self.download.id.to_string();
        if let Some(chunk) = self.book.chunk(index) {
            tracing::trace!(
                target: "rapid.download",
                id = %id,
                chunk = index,
                transferred = chunk.transferred,
                "Chunk progress"
            );
            self.ctx.emitter.emit(DownloadEvent::ChunkProgress {
                id: id.clone(),
                index,
                transferred: chunk.transferred,
                size: chunk.range.len(),
            });
        }
        self.ctx.emitter.emit(DownloadEvent::DownloadProgress {
            id,
            progress: self.download.progress,
            speed,
            time_left: self.download.time_left,
        });
    }

    /// Commit to the registry and write through to the repository.
    async fn persist(&self) {
        if let Err(violation) = self.download.check_invariants() {
            tracing::error!(
                target: "rapid.download",
                id = %self.download.id,
                violation = %violation,
                "Download state is inconsistent"
            );
        }

        if !self
            .ctx
            .registry
            .commit_with_request(&self.download, &self.request)
            .await
        {
            return;
        }
        let Some(entry) = self.ctx.registry.entry(&self.download.id).await else {
            return;
        };
        if let Err(e) = self.ctx.repository.save(&entry).await {
            tracing::warn!(
                target: "rapid.download",
                id = %self.download.id,
                error = %e,
                "Failed to persist download"
            );
        }
    }
}
