//! Download event emitter port.
//!
//! Lets the engine emit events without coupling to a transport (SSE,
//! terminal progress bars, channels).

use crate::download::DownloadEvent;

/// Port for emitting download events.
pub trait DownloadEventEmitterPort: Send + Sync {
    /// Emit a download event.
    ///
    /// Must not block; implementations buffer or drop.
    fn emit(&self, event: DownloadEvent);

    /// Clone this emitter into a boxed trait object.
    fn clone_box(&self) -> Box<dyn DownloadEventEmitterPort>;
}

/// A no-op download event emitter for tests and headless contexts.
#[derive(Debug, Clone, Default)]
pub struct NoopDownloadEmitter;

impl NoopDownloadEmitter {
    /// Create a new no-op download emitter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl DownloadEventEmitterPort for NoopDownloadEmitter {
    fn emit(&self, _event: DownloadEvent) {}

    fn clone_box(&self) -> Box<dyn DownloadEventEmitterPort> {
        Box::new(self.clone())
    }
}
