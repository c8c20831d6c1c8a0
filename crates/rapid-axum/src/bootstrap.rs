//! Axum server bootstrap - the composition root.
//!
//! The only place where the HTTP adapter wires concrete infrastructure:
//! `SQLite` persistence, the reqwest transport, file storage and the SSE
//! broadcaster.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use rapid_core::ports::{
    ChunkStorage, DownloadEventEmitterPort, EntryRepositoryPort, SyncPort, TransferPort,
};
use rapid_core::{EngineConfig, database_path, default_download_dir};
use rapid_db::{SqliteEntryRepository, setup_database};
use rapid_download::{
    DownloadEngine, EngineDeps, FileStorage, ProviderResolver, ReqwestTransport, SyncService,
};

use crate::sse::SseBroadcaster;

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 9988;

/// CORS configuration for the web server.
#[derive(Debug, Clone, Default)]
pub enum CorsConfig {
    /// Allow all origins (development mode).
    #[default]
    AllowAll,
    /// Allow specific origins (production mode).
    AllowOrigins(Vec<String>),
}

/// Server configuration for the Axum adapter.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port for the HTTP server.
    pub port: u16,
    /// CORS configuration.
    pub cors: CorsConfig,
    /// `SQLite` database file.
    pub database_path: PathBuf,
    /// Engine configuration.
    pub engine: EngineConfig,
}

impl ServerConfig {
    /// Config with the platform data and download directories.
    pub fn with_defaults() -> Result<Self> {
        Ok(Self {
            port: DEFAULT_PORT,
            cors: CorsConfig::default(),
            database_path: database_path()?,
            engine: EngineConfig::new(default_download_dir()?),
        })
    }

    /// Set the listening port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set CORS to allow specific origins.
    #[must_use]
    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.cors = CorsConfig::AllowOrigins(origins);
        self
    }
}

/// Services shared by the HTTP handlers.
pub struct AxumContext {
    /// The engine, kept for lifecycle control.
    pub engine: Arc<DownloadEngine>,
    /// Client-facing sync surface.
    pub sync: Arc<dyn SyncPort>,
    /// SSE broadcaster wired as the engine's event emitter.
    pub sse: Arc<SseBroadcaster>,
}

impl AxumContext {
    /// Build the context around an engine whose emitter is `sse`.
    pub fn new(engine: Arc<DownloadEngine>, sse: Arc<SseBroadcaster>) -> Self {
        let sync: Arc<dyn SyncPort> = Arc::new(SyncService::new(Arc::clone(&engine)));
        Self { engine, sync, sse }
    }
}

/// Wire the engine with its production adapters and restore persisted
/// downloads.
pub async fn bootstrap(config: ServerConfig) -> Result<AxumContext> {
    tracing::info!(
        target: "rapid.http",
        database_path = %config.database_path.display(),
        download_dir = %config.engine.download_dir.display(),
        staging_dir = %config.engine.staging_dir.display(),
        "Axum bootstrap resolved paths"
    );

    let pool = setup_database(&config.database_path).await?;
    let repository: Arc<dyn EntryRepositoryPort> = Arc::new(SqliteEntryRepository::new(pool));

    let sse = Arc::new(SseBroadcaster::with_defaults());
    let emitter: Arc<dyn DownloadEventEmitterPort> = sse.clone();
    let transport: Arc<dyn TransferPort> = Arc::new(ReqwestTransport::new()?);
    let storage: Arc<dyn ChunkStorage> = Arc::new(FileStorage::new(
        &config.engine.staging_dir,
        &config.engine.download_dir,
    ));

    let engine = Arc::new(DownloadEngine::new(EngineDeps {
        transport,
        storage,
        repository,
        emitter,
        resolver: ProviderResolver::with_builtin(&config.engine),
        config: config.engine,
    })?);
    engine.restore().await?;

    Ok(AxumContext::new(engine, sse))
}

/// Start the web server and run until Ctrl-C.
///
/// On shutdown every transferring download is persisted as paused.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    use tokio::net::TcpListener;

    let port = config.port;
    let cors = config.cors.clone();
    let ctx = bootstrap(config).await?;
    let engine = Arc::clone(&ctx.engine);
    let app = crate::routes::create_router(ctx, &cors);

    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(target: "rapid.http", "rapid server listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(target: "rapid.http", error = %e, "Failed to listen for Ctrl-C");
            }
        })
        .await?;

    engine.shutdown().await;
    Ok(())
}
