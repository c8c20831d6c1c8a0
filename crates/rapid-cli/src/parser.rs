//! Root CLI structure with global options.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Command-line interface for the rapid download engine.
#[derive(Parser)]
#[command(name = "rapid")]
#[command(about = "Chunked, resumable downloads from the terminal or over HTTP")]
#[command(version)]
pub struct Cli {
    /// Directory finished downloads are moved into
    #[arg(long = "download-dir", env = "RAPID_DOWNLOAD_DIR", global = true)]
    pub download_dir: Option<PathBuf>,

    /// Registry database file
    #[arg(long = "database", env = "RAPID_DATABASE", global = true)]
    pub database: Option<PathBuf>,

    /// Global cap on concurrent chunk connections
    #[arg(long = "max-connections", env = "RAPID_MAX_CONNECTIONS", global = true)]
    pub max_connections: Option<usize>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
