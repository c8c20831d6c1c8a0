//! CLI bootstrap - the composition root.
//!
//! The only place where the CLI wires concrete infrastructure: the `SQLite`
//! registry, the reqwest transport and file storage. Handlers receive a
//! composed [`CliContext`].

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use rapid_core::ports::{
    ChunkStorage, DownloadEventEmitterPort, EntryRepositoryPort, TransferPort,
};
use rapid_core::{EngineConfig, database_path, default_download_dir};
use rapid_db::{SqliteEntryRepository, setup_database};
use rapid_download::{
    DownloadEngine, EngineDeps, FileStorage, ProviderResolver, ReqwestTransport,
};

use crate::parser::Cli;

/// Bootstrap configuration for the CLI.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Registry database file.
    pub database_path: PathBuf,
    /// Engine configuration.
    pub engine: EngineConfig,
}

impl CliConfig {
    /// Resolve paths and engine settings from global flags, falling back to
    /// the platform defaults.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let database_path = match &cli.database {
            Some(path) => path.clone(),
            None => database_path()?,
        };
        let download_dir = match &cli.download_dir {
            Some(dir) => dir.clone(),
            None => default_download_dir()?,
        };

        let mut engine = EngineConfig::new(download_dir);
        if let Some(max) = cli.max_connections {
            engine = engine.with_max_connections(max);
        }
        Ok(Self {
            database_path,
            engine,
        })
    }
}

/// Composed infrastructure for CLI commands.
pub struct CliContext {
    /// The download engine, with persisted downloads restored.
    pub engine: Arc<DownloadEngine>,
    /// The durable registry.
    pub repository: Arc<dyn EntryRepositoryPort>,
}

/// Open the durable registry only.
pub async fn open_repository(config: &CliConfig) -> Result<Arc<dyn EntryRepositoryPort>> {
    let pool = setup_database(&config.database_path).await?;
    Ok(Arc::new(SqliteEntryRepository::new(pool)))
}

/// Compose the engine with production adapters, publishing events to
/// `emitter`, and restore persisted downloads.
pub async fn bootstrap(
    config: CliConfig,
    emitter: Arc<dyn DownloadEventEmitterPort>,
) -> Result<CliContext> {
    let repository = open_repository(&config).await?;
    let transport: Arc<dyn TransferPort> = Arc::new(ReqwestTransport::new()?);
    let storage: Arc<dyn ChunkStorage> = Arc::new(FileStorage::new(
        &config.engine.staging_dir,
        &config.engine.download_dir,
    ));

    let engine = Arc::new(DownloadEngine::new(EngineDeps {
        transport,
        storage,
        repository: Arc::clone(&repository),
        emitter,
        resolver: ProviderResolver::with_builtin(&config.engine),
        config: config.engine,
    })?);
    engine.restore().await?;

    Ok(CliContext { engine, repository })
}
