//! Progress throttling.
//!
//! Bounds how often a chunk worker reports progress: at most once per
//! interval, or sooner once enough bytes have accumulated.

use std::time::{Duration, Instant};

/// Rate-limiter for progress reports.
pub struct ProgressThrottle {
    last_emit: Option<Instant>,
    min_interval: Duration,
    byte_threshold: u64,
    pending_bytes: u64,
}

impl ProgressThrottle {
    /// Create a new throttle with the specified minimum interval and byte threshold.
    pub const fn new(min_interval: Duration, byte_threshold: u64) -> Self {
        Self {
            last_emit: None,
            min_interval,
            byte_threshold,
            pending_bytes: 0,
        }
    }

    /// Record `bytes` and check whether a report is due.
    pub fn should_emit(&mut self, bytes: u64) -> bool {
        self.should_emit_at(bytes, Instant::now())
    }

    fn should_emit_at(&mut self, bytes: u64, now: Instant) -> bool {
        self.pending_bytes = self.pending_bytes.saturating_add(bytes);
        let due = match self.last_emit {
            None => true,
            Some(last) => {
                now.duration_since(last) >= self.min_interval
                    || (self.byte_threshold > 0 && self.pending_bytes >= self.byte_threshold)
            }
        };
        if due {
            self.last_emit = Some(now);
            self.pending_bytes = 0;
        }
        due
    }

    /// Force the next check to return true.
    pub const fn reset(&mut self) {
        self.last_emit = None;
    }
}
