//! Global connection budget shared by every chunk worker.

use std::sync::Arc;

use rapid_core::DownloadError;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Caps the number of chunk connections open across all downloads.
#[derive(Clone, Debug)]
pub struct ConnectionBudget {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl ConnectionBudget {
    /// Create a budget of `capacity` connections. Zero is rejected.
    pub fn new(capacity: usize) -> Result<Self, DownloadError> {
        if capacity == 0 {
            return Err(DownloadError::invalid_request(
                "connection budget must allow at least one connection",
            ));
        }
        Ok(Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        })
    }

    /// Wait for a free connection slot.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, DownloadError> {
        Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| DownloadError::unavailable("connection budget closed"))
    }

    /// Slots currently free.
    #[must_use]
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Total slots.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}
