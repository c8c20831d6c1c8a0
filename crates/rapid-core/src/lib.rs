//! Core domain types and port definitions for rapid.
//!
//! This crate is pure: it defines the `Download` entity and its wire shapes,
//! the error taxonomy, engine configuration, path resolution and the port
//! traits implemented by `rapid-download`, `rapid-db` and `rapid-axum`.
#![deny(unused_crate_dependencies)]

pub mod config;
pub mod download;
pub mod paths;
pub mod ports;

pub use config::EngineConfig;
pub use download::{
    BatchOutcome, BatchUpdate, ByteRange, ChunkAssignment, ChunkError, Cookie, Download,
    DownloadError, DownloadEvent, DownloadId, DownloadResult, DownloadStatus, Intent, ItemOutcome,
    NewDownload, Page, ProviderError, Request, RequestTemplate, SameSite, StorageError,
    UpdateDownload,
};
pub use paths::{PathError, data_root, database_path, default_download_dir, ensure_directory};
pub use ports::{
    ByteStream, ChunkStorage, ChunkWriter, DownloadEventEmitterPort, EntryRepositoryPort,
    NoopDownloadEmitter, Provider, ProviderContext, RepositoryError, ResourceInfo, StoredEntry,
    SyncPort, TransferPort,
};
