//! SSE broadcaster for download events.
//!
//! Implements [`DownloadEventEmitterPort`] so the engine can publish events
//! that are streamed to every connected `/events` client.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::Stream;
use rapid_core::{DownloadEvent, DownloadEventEmitterPort};
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

const DEFAULT_CAPACITY: usize = 256;
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Fans download events out to SSE subscribers.
///
/// Slow clients that fall behind the buffer skip the events they missed.
#[derive(Debug, Clone)]
pub struct SseBroadcaster {
    sender: broadcast::Sender<DownloadEvent>,
}

impl SseBroadcaster {
    /// Create a broadcaster buffering up to `capacity` events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Create a broadcaster with the default capacity.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    /// Open an SSE stream for a new client, with a keep-alive ping every 30s.
    ///
    /// Each event is named after its kind (`download_progress`, ...) and
    /// carries the JSON event as data.
    pub fn subscribe(
        self: Arc<Self>,
    ) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static> {
        let stream = BroadcastStream::new(self.sender.subscribe()).filter_map(|result| {
            match result {
                Ok(event) => to_sse(&event).map(Ok),
                Err(e) => {
                    tracing::debug!(target: "rapid.http", error = %e, "SSE subscriber lagged");
                    None
                }
            }
        });

        Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL).text("ping"))
    }

    /// Number of connected subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

fn to_sse(event: &DownloadEvent) -> Option<Event> {
    let value = match serde_json::to_value(event) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(target: "rapid.http", error = %e, "Failed to serialize event");
            return None;
        }
    };
    let kind = value
        .get("type")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("message")
        .to_string();
    Some(Event::default().event(kind).data(value.to_string()))
}

impl DownloadEventEmitterPort for SseBroadcaster {
    fn emit(&self, event: DownloadEvent) {
        // No subscribers is fine.
        let _ = self.sender.send(event);
    }

    fn clone_box(&self) -> Box<dyn DownloadEventEmitterPort> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers() {
        let broadcaster = SseBroadcaster::with_defaults();
        assert_eq!(broadcaster.subscriber_count(), 0);
        broadcaster.emit(DownloadEvent::paused("a"));
    }

    #[tokio::test]
    async fn test_subscriber_receives_events() {
        let broadcaster = SseBroadcaster::with_defaults();
        let mut receiver = broadcaster.sender.subscribe();

        broadcaster.emit(DownloadEvent::removed("42"));

        let event = receiver.recv().await.unwrap();
        assert!(matches!(event, DownloadEvent::DownloadRemoved { ref id } if id == "42"));
    }

    #[test]
    fn test_event_named_after_kind() {
        assert!(to_sse(&DownloadEvent::paused("a")).is_some());
        let value = serde_json::to_value(DownloadEvent::paused("a")).unwrap();
        assert_eq!(value["type"], "download_paused");
    }
}
