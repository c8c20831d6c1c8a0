//! Per-download chunk bookkeeping.
//!
//! Pure state: which chunks are idle, in flight or done, how many bytes each
//! holds, and when a failed chunk may be retried. The supervisor loop advances
//! it; nothing here spawns or sleeps.

use std::time::{Duration, Instant};

use rapid_core::{ChunkAssignment, ChunkError, Download, EngineConfig};

use crate::chunk::{ChunkOutcome, Lease};
use crate::planner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Idle,
    InFlight { lease: Lease, attempt_start: u64 },
    Done,
}

#[derive(Debug, Clone)]
struct Slot {
    chunk: ChunkAssignment,
    state: SlotState,
}

impl Slot {
    fn held_by(&self, lease: Lease) -> bool {
        matches!(self.state, SlotState::InFlight { lease: held, .. } if held == lease)
    }
}

/// What the supervisor should do after a worker finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The message belongs to an earlier attempt.
    Stale,
    /// The chunk's range is complete.
    ChunkDone,
    /// The worker stopped on request.
    Stopped,
    /// Transient failure; retry after `delay`.
    Retry {
        /// Failed attempts so far.
        attempt: u32,
        /// Backoff before the next attempt.
        delay: Duration,
    },
    /// The link or credentials are no longer valid.
    Expired(String),
    /// Permanent or storage failure.
    Fatal(ChunkError),
    /// Transient failures exceeded the retry budget.
    Exhausted(ChunkError),
}

/// Chunk table for one download.
#[derive(Debug, Clone)]
pub struct ChunkBook {
    slots: Vec<Slot>,
    ranged: bool,
}

impl ChunkBook {
    /// Re-plan the chunks of `download` and mark its recorded chunks done.
    #[must_use]
    pub fn from_download(download: &Download) -> Self {
        let plan = planner::plan(
            download.known_size(),
            download.resumable,
            download.chunk_len,
        );
        let slots = plan
            .ranges
            .iter()
            .zip(0u32..)
            .map(|(range, index)| {
                let mut chunk = ChunkAssignment::new(download.id.clone(), index, *range);
                let state = if download.downloaded_chunks.binary_search(&index).is_ok() {
                    chunk.completed = true;
                    chunk.transferred = range.len().unwrap_or(0);
                    SlotState::Done
                } else {
                    SlotState::Idle
                };
                Slot { chunk, state }
            })
            .collect();

        Self {
            slots,
            ranged: plan.resumable,
        }
    }

    /// Whether chunks are fetched with range requests.
    #[must_use]
    pub const fn is_ranged(&self) -> bool {
        self.ranged
    }

    /// Number of chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the book holds no chunks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Assignment snapshot for a chunk.
    #[must_use]
    pub fn chunk(&self, index: u32) -> Option<&ChunkAssignment> {
        self.slots.get(index as usize).map(|s| &s.chunk)
    }

    /// Idle chunks whose backoff has elapsed, lowest index first, capped so
    /// that at most `limit` chunks are in flight.
    #[must_use]
    pub fn ready(&self, now: Instant, limit: usize) -> Vec<u32> {
        let free = limit.saturating_sub(self.in_flight());
        self.slots
            .iter()
            .filter(|s| s.state == SlotState::Idle)
            .filter(|s| s.chunk.next_attempt_at.is_none_or(|at| at <= now))
            .map(|s| s.chunk.index)
            .take(free)
            .collect()
    }

    /// Earliest pending retry instant.
    #[must_use]
    pub fn next_wake(&self) -> Option<Instant> {
        self.slots
            .iter()
            .filter(|s| s.state == SlotState::Idle)
            .filter_map(|s| s.chunk.next_attempt_at)
            .min()
    }

    /// Hand a chunk to a new attempt.
    pub fn begin(&mut self, index: u32, lease: Lease) -> Option<ChunkAssignment> {
        let slot = self.slots.get_mut(index as usize)?;
        if slot.state != SlotState::Idle {
            return None;
        }
        slot.state = SlotState::InFlight {
            lease,
            attempt_start: slot.chunk.transferred,
        };
        slot.chunk.next_attempt_at = None;
        Some(slot.chunk.clone())
    }

    /// Apply a progress report. Returns whether it advanced the chunk.
    pub fn progress(&mut self, index: u32, lease: Lease, transferred: u64) -> bool {
        let Some(slot) = self.slots.get_mut(index as usize) else {
            return false;
        };
        if !slot.held_by(lease) || transferred <= slot.chunk.transferred {
            return false;
        }
        slot.chunk.transferred = transferred;
        true
    }

    /// Apply a worker's terminal outcome.
    pub fn finish(
        &mut self,
        index: u32,
        lease: Lease,
        transferred: u64,
        outcome: ChunkOutcome,
        now: Instant,
        config: &EngineConfig,
    ) -> Decision {
        let Some(slot) = self.slots.get_mut(index as usize) else {
            return Decision::Stale;
        };
        if !slot.held_by(lease) {
            return Decision::Stale;
        }
        slot.chunk.transferred = slot.chunk.transferred.max(transferred);
        slot.state = SlotState::Idle;

        match outcome {
            ChunkOutcome::Completed => {
                slot.chunk.completed = true;
                slot.state = SlotState::Done;
                Decision::ChunkDone
            }
            ChunkOutcome::Paused | ChunkOutcome::Cancelled => Decision::Stopped,
            ChunkOutcome::Failed(ChunkError::Expired { message }) => Decision::Expired(message),
            ChunkOutcome::Failed(err) if err.is_retryable() => {
                slot.chunk.attempts += 1;
                let attempt = slot.chunk.attempts;
                if attempt > config.max_retries {
                    return Decision::Exhausted(err);
                }
                let delay = config.retry_delay(attempt);
                slot.chunk.next_attempt_at = Some(now + delay);
                Decision::Retry { attempt, delay }
            }
            ChunkOutcome::Failed(err) => Decision::Fatal(err),
        }
    }

    /// Forget an attempt whose worker did not stop in time.
    ///
    /// Bytes reported by that attempt are discarded; the chunk stays retryable.
    pub fn abandon(&mut self, index: u32) {
        if let Some(slot) = self.slots.get_mut(index as usize) {
            if let SlotState::InFlight { attempt_start, .. } = slot.state {
                slot.chunk.transferred = attempt_start;
                slot.chunk.attempts += 1;
                slot.state = SlotState::Idle;
            }
        }
    }

    /// Bytes written across all chunks.
    #[must_use]
    pub fn bytes_done(&self) -> u64 {
        self.slots.iter().map(|s| s.chunk.transferred).sum()
    }

    /// Indices of completed chunks, ascending.
    #[must_use]
    pub fn completed_indices(&self) -> Vec<u32> {
        self.slots
            .iter()
            .filter(|s| s.state == SlotState::Done)
            .map(|s| s.chunk.index)
            .collect()
    }

    /// Number of completed chunks.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.slots.iter().filter(|s| s.state == SlotState::Done).count()
    }

    /// Whether every chunk is complete.
    #[must_use]
    pub fn all_done(&self) -> bool {
        self.slots.iter().all(|s| s.state == SlotState::Done)
    }

    /// Chunks with a running attempt.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s.state, SlotState::InFlight { .. }))
            .count()
    }

    /// Start over from byte 0.
    pub fn reset_all(&mut self) {
        for slot in &mut self.slots {
            slot.chunk.completed = false;
            slot.chunk.transferred = 0;
            slot.chunk.attempts = 0;
            slot.chunk.next_attempt_at = None;
            slot.state = SlotState::Idle;
        }
    }

    /// Clear retry counters and pending backoff (on an explicit resume).
    pub fn reset_attempts(&mut self) {
        for slot in &mut self.slots {
            slot.chunk.attempts = 0;
            slot.chunk.next_attempt_at = None;
        }
    }

    /// Drop the bytes of one idle chunk.
    pub fn reset_chunk(&mut self, index: u32) {
        if let Some(slot) = self.slots.get_mut(index as usize) {
            if slot.state == SlotState::Idle {
                slot.chunk.transferred = 0;
            }
        }
    }
}
