//! Chunk worker pipeline.
//!
//! A worker owns one [`ChunkAssignment`] for one attempt. It operates on value
//! types and cloned `Arc` dependencies, never touching supervisor state.
//!
//! # Design Principles
//!
//! - Progress and the terminal outcome are sent to the supervisor's inbox
//! - Progress is throttled and dropped when the inbox is full; the outcome never is
//! - Pause and cancel are observed between reads via `tokio::select!`
//! - Bytes are only ever written inside the assignment's range

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use rapid_core::ports::{ChunkStorage, ChunkWriter, TransferPort};
use rapid_core::{ChunkAssignment, ChunkError, RequestTemplate};

use crate::budget::ConnectionBudget;
use crate::progress::ProgressThrottle;

/// Identifies one attempt of one chunk.
///
/// Messages carrying a stale lease are ignored by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Lease(pub u64);

/// Terminal outcome of a chunk attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Every byte of the range was written.
    Completed,
    /// Stopped by a pause; written bytes are kept.
    Paused,
    /// Stopped because the download is being removed.
    Cancelled,
    /// The attempt failed.
    Failed(ChunkError),
}

/// Message from a worker to its supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerMessage {
    /// Bytes of the chunk written so far (non-decreasing per lease).
    Progress {
        /// Chunk index.
        index: u32,
        /// Attempt lease.
        lease: Lease,
        /// Bytes written, relative to the range start.
        transferred: u64,
    },
    /// The attempt ended.
    Finished {
        /// Chunk index.
        index: u32,
        /// Attempt lease.
        lease: Lease,
        /// Bytes written, relative to the range start.
        transferred: u64,
        /// How it ended.
        outcome: ChunkOutcome,
    },
}

/// A chunk attempt to execute.
#[derive(Debug, Clone)]
pub struct ChunkJob {
    /// Assignment snapshot at attempt start.
    pub assignment: ChunkAssignment,
    /// Attempt lease.
    pub lease: Lease,
    /// Worker-owned copy of the request template.
    pub template: RequestTemplate,
    /// Whether to issue a range request.
    pub ranged: bool,
}

/// Stop signals observed by a worker.
#[derive(Debug, Clone)]
pub struct ChunkSignals {
    /// Pause: stop, keep written bytes.
    pub pause: CancellationToken,
    /// Cancel: stop, the download is going away.
    pub cancel: CancellationToken,
}

/// Dependencies for chunk workers.
#[derive(Clone)]
pub struct WorkerDeps {
    /// Network side.
    pub transport: Arc<dyn TransferPort>,
    /// Storage side.
    pub storage: Arc<dyn ChunkStorage>,
    /// Global connection budget.
    pub budget: ConnectionBudget,
    /// Minimum interval between progress reports.
    pub progress_interval: Duration,
    /// Bytes after which a report is sent regardless of the interval.
    pub progress_byte_threshold: u64,
}

/// Run one chunk attempt and report its outcome to `inbox`.
pub async fn run_chunk(
    job: ChunkJob,
    deps: WorkerDeps,
    signals: ChunkSignals,
    inbox: mpsc::Sender<WorkerMessage>,
) {
    let index = job.assignment.index;
    let lease = job.lease;
    let mut transferred = job.assignment.transferred;

    let outcome = execute(&job, &deps, &signals, &inbox, &mut transferred).await;

    match &outcome {
        ChunkOutcome::Failed(err) => tracing::debug!(
            target: "rapid.download",
            id = %job.assignment.download_id,
            chunk = index,
            transferred,
            error = %err,
            "Chunk attempt failed"
        ),
        other => tracing::trace!(
            target: "rapid.download",
            id = %job.assignment.download_id,
            chunk = index,
            transferred,
            outcome = ?other,
            "Chunk attempt ended"
        ),
    }

    // The supervisor may already be gone (engine shutdown); nothing to do then.
    let _ = inbox
        .send(WorkerMessage::Finished {
            index,
            lease,
            transferred,
            outcome,
        })
        .await;
}

async fn execute(
    job: &ChunkJob,
    deps: &WorkerDeps,
    signals: &ChunkSignals,
    inbox: &mpsc::Sender<WorkerMessage>,
    transferred: &mut u64,
) -> ChunkOutcome {
    let assignment = &job.assignment;
    let limit = assignment.range.len();
    if limit.is_some_and(|len| *transferred >= len) {
        return ChunkOutcome::Completed;
    }

    let _permit = tokio::select! {
        biased;
        () = signals.cancel.cancelled() => return ChunkOutcome::Cancelled,
        () = signals.pause.cancelled() => return ChunkOutcome::Paused,
        permit = deps.budget.acquire() => match permit {
            Ok(permit) => permit,
            Err(e) => return ChunkOutcome::Failed(ChunkError::transient(e.to_string())),
        },
    };

    let range = job.ranged.then(|| assignment.remaining_range());
    let offset = assignment.range.start + *transferred;

    let mut writer = match deps.storage.open_writer(&assignment.download_id, offset).await {
        Ok(writer) => writer,
        Err(e) => return ChunkOutcome::Failed(ChunkError::Storage(e)),
    };

    let mut stream = tokio::select! {
        biased;
        () = signals.cancel.cancelled() => return ChunkOutcome::Cancelled,
        () = signals.pause.cancelled() => return ChunkOutcome::Paused,
        result = deps.transport.fetch(&job.template, range) => match result {
            Ok(stream) => stream,
            Err(e) => return ChunkOutcome::Failed(e),
        },
    };

    let mut throttle = ProgressThrottle::new(deps.progress_interval, deps.progress_byte_threshold);

    let outcome = loop {
        let next = tokio::select! {
            biased;
            () = signals.cancel.cancelled() => break ChunkOutcome::Cancelled,
            () = signals.pause.cancelled() => break ChunkOutcome::Paused,
            next = stream.next() => next,
        };

        match next {
            Some(Ok(bytes)) => {
                let take = limit.map_or(bytes.len(), |len| {
                    let remaining = len.saturating_sub(*transferred);
                    usize::try_from(remaining).map_or(bytes.len(), |r| r.min(bytes.len()))
                });
                if let Err(e) = writer.write(&bytes[..take]).await {
                    break ChunkOutcome::Failed(ChunkError::Storage(e));
                }
                *transferred += take as u64;

                if limit.is_some_and(|len| *transferred >= len) {
                    break ChunkOutcome::Completed;
                }
                if throttle.should_emit(take as u64) {
                    // Dropped when the inbox is full; the next report supersedes it.
                    let _ = inbox.try_send(WorkerMessage::Progress {
                        index: assignment.index,
                        lease: job.lease,
                        transferred: *transferred,
                    });
                }
            }
            Some(Err(e)) => break ChunkOutcome::Failed(e),
            None => {
                break match limit {
                    Some(len) if *transferred < len => ChunkOutcome::Failed(
                        ChunkError::transient(format!(
                            "connection closed after {} of {len} bytes",
                            *transferred
                        )),
                    ),
                    _ => ChunkOutcome::Completed,
                };
            }
        }
    };

    finish_writer(writer.as_mut(), outcome).await
}

async fn finish_writer(writer: &mut dyn ChunkWriter, outcome: ChunkOutcome) -> ChunkOutcome {
    match writer.flush().await {
        Ok(()) => outcome,
        Err(e) if !matches!(outcome, ChunkOutcome::Cancelled) => {
            ChunkOutcome::Failed(ChunkError::Storage(e))
        }
        Err(_) => outcome,
    }
}
