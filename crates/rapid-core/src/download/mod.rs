//! Download domain types, events, errors, and DTOs.
//!
//! Pure data types only. No I/O, networking, or runtime dependencies allowed.
//!
//! # Structure
//!
//! - `types` - Identifiers and the `Download` entity, byte ranges, chunk assignments
//! - `request` - Wire `Request`, cookies, and resolved `RequestTemplate`
//! - `patch` - Client patches, batch DTOs, intents, and pages
//! - `events` - Download events (`DownloadEvent`)
//! - `errors` - Error taxonomy for providers, chunks, and downloads

pub mod errors;
pub mod events;
pub mod patch;
pub mod request;
pub mod types;

pub use errors::{ChunkError, DownloadError, ProviderError, StorageError};
pub use events::DownloadEvent;
pub use patch::{BatchOutcome, BatchUpdate, Intent, ItemOutcome, Page, UpdateDownload};
pub use request::{Cookie, Request, RequestTemplate, SameSite};
pub use types::{ByteRange, ChunkAssignment, Download, DownloadId, DownloadStatus, NewDownload};

/// Result type alias for download operations.
pub type DownloadResult<T> = Result<T, DownloadError>;
