//! Per-chunk progress bars driven by download events.

use std::collections::BTreeMap;

use indicatif::{HumanBytes, MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use rapid_core::{DownloadEvent, DownloadEventEmitterPort};
use tokio::sync::mpsc;

/// Emitter forwarding engine events to the foreground task.
#[derive(Clone)]
pub struct ChannelEmitter {
    tx: mpsc::UnboundedSender<DownloadEvent>,
}

impl ChannelEmitter {
    /// Create the emitter and the receiving end.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DownloadEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl DownloadEventEmitterPort for ChannelEmitter {
    fn emit(&self, event: DownloadEvent) {
        // Receiver gone means the command is exiting.
        let _ = self.tx.send(event);
    }

    fn clone_box(&self) -> Box<dyn DownloadEventEmitterPort> {
        Box::new(self.clone())
    }
}

/// How a foreground download ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Finalized at this path.
    Completed(String),
    /// Paused by the user.
    Paused,
    /// Waiting for re-resolution.
    Expired(String),
    /// Failed with a human-readable reason.
    Failed(String),
    /// Removed.
    Removed,
}

/// One bar per chunk, created as chunks report progress.
pub struct ChunkBars {
    id: String,
    multi: MultiProgress,
    bars: BTreeMap<u32, ProgressBar>,
}

impl ChunkBars {
    /// Bars for download `id`, drawn to stderr.
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_draw_target(id, ProgressDrawTarget::stderr())
    }

    /// Bars drawn to an explicit target.
    pub fn with_draw_target(id: impl Into<String>, target: ProgressDrawTarget) -> Self {
        Self {
            id: id.into(),
            multi: MultiProgress::with_draw_target(target),
            bars: BTreeMap::new(),
        }
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "chunk {prefix:>3} {bar:30.cyan/blue} {bytes:>10}/{total_bytes:<10} {binary_bytes_per_sec:>12} ETA {eta}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
    }

    fn bar(&mut self, index: u32) -> &ProgressBar {
        let multi = &self.multi;
        self.bars.entry(index).or_insert_with(|| {
            let bar = multi.add(ProgressBar::new(0));
            bar.set_style(Self::bar_style());
            bar.set_prefix(index.to_string());
            bar
        })
    }

    /// Current position of a chunk's bar.
    pub fn position(&self, index: u32) -> Option<u64> {
        self.bars.get(&index).map(ProgressBar::position)
    }

    /// Whether a chunk's bar was finished.
    pub fn is_finished(&self, index: u32) -> bool {
        self.bars.get(&index).is_some_and(ProgressBar::is_finished)
    }

    /// Apply one event. Returns the outcome once the download stops.
    pub fn apply(&mut self, event: &DownloadEvent) -> Option<Outcome> {
        if event.id() != self.id {
            return None;
        }
        match event {
            DownloadEvent::ChunkProgress {
                index,
                transferred,
                size,
                ..
            } => {
                let bar = self.bar(*index);
                if let Some(size) = size {
                    bar.set_length(*size);
                }
                bar.set_position(*transferred);
                None
            }
            DownloadEvent::ChunkCompleted { index, .. } => {
                let bar = self.bar(*index);
                if let Some(len) = bar.length() {
                    bar.set_position(len);
                }
                bar.finish();
                None
            }
            DownloadEvent::DownloadCompleted { path, .. } => {
                self.finish();
                Some(Outcome::Completed(path.clone()))
            }
            DownloadEvent::DownloadPaused { .. } => {
                self.abandon();
                Some(Outcome::Paused)
            }
            DownloadEvent::DownloadExpired { reason, .. } => {
                self.abandon();
                Some(Outcome::Expired(reason.clone()))
            }
            DownloadEvent::DownloadFailed { error, .. } => {
                self.abandon();
                Some(Outcome::Failed(error.clone()))
            }
            DownloadEvent::DownloadRemoved { .. } => {
                self.abandon();
                Some(Outcome::Removed)
            }
            DownloadEvent::DownloadCreated { .. }
            | DownloadEvent::DownloadStarted { .. }
            | DownloadEvent::DownloadProgress { .. } => None,
        }
    }

    fn finish(&self) {
        for bar in self.bars.values() {
            bar.finish();
        }
    }

    fn abandon(&self) {
        for bar in self.bars.values() {
            bar.abandon();
        }
    }
}

/// One-line summary of a finished download's size.
pub fn size_label(size: u64) -> String {
    if size == 0 {
        "unknown size".to_string()
    } else {
        HumanBytes(size).to_string()
    }
}
