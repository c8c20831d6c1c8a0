//! Chunked, resumable, multi-provider download engine.
//!
//! This crate implements the engine behind the sync surface defined in
//! `rapid-core`: providers, chunk planning, chunk workers, per-download
//! supervisors, the registry and the sync service, plus the reqwest transport
//! and file storage used in production.
//!
//! # Architecture
//!
//! - `provider` - Provider resolver and built-in providers
//! - `planner` - Pure chunk planning
//! - `chunk` - Chunk worker pipeline
//! - `supervisor` - One actor per download, single writer of its state
//! - `registry` - In-memory table, paged by creation order
//! - `engine` - Composition of the above
//! - `sync` - Client-facing `SyncPort` implementation
//! - `http` / `storage` - Network and file system adapters
//!
//! # Example
//!
//! ```ignore
//! use rapid_download::{DownloadEngine, EngineDeps, FileStorage, ProviderResolver, ReqwestTransport};
//!
//! let engine = DownloadEngine::new(EngineDeps {
//!     transport: Arc::new(ReqwestTransport::new()?),
//!     storage: Arc::new(FileStorage::new(&config.staging_dir, &config.download_dir)),
//!     repository,
//!     emitter,
//!     resolver: ProviderResolver::with_builtin(&config),
//!     config,
//! })?;
//! let download = engine.create(Request::new("https://example.com/file.iso")).await?;
//! ```

#![deny(unused_crate_dependencies)]

pub mod budget;
pub mod chunk;
pub mod engine;
pub mod http;
pub mod planner;
pub mod progress;
pub mod provider;
pub mod registry;
pub mod storage;
pub mod sync;

mod supervisor;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

#[cfg(test)]
use serde_json as _;
#[cfg(test)]
use tempfile as _;
#[cfg(test)]
use tokio_test as _;

pub use budget::ConnectionBudget;
pub use engine::{DownloadEngine, EngineDeps};
pub use http::ReqwestTransport;
pub use planner::{ChunkPlan, plan};
pub use provider::{CookieProvider, DirectProvider, ProviderResolver, RedirectProvider, Resolution};
pub use registry::Registry;
pub use storage::FileStorage;
pub use sync::SyncService;
