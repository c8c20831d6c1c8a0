//! Path resolution for application data and downloads.
//!
//! Resolution order for every root:
//! 1. `RAPID_*` environment variable (highest priority)
//! 2. Platform directory via `dirs`
//!
//! Directories are created on first use.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Environment variable overriding the data root.
pub const DATA_DIR_ENV: &str = "RAPID_DATA_DIR";

/// Environment variable overriding the download directory.
pub const DOWNLOAD_DIR_ENV: &str = "RAPID_DOWNLOAD_DIR";

/// Errors that can occur during path resolution and directory operations.
#[derive(Debug, Error)]
pub enum PathError {
    /// Could not determine the system data directory.
    #[error("Cannot determine system data directory")]
    NoDataDir,

    /// A path was expected to be a directory but was not.
    #[error("{0} exists but is not a directory")]
    NotADirectory(PathBuf),

    /// Failed to create a directory.
    #[error("Failed to create directory {path}: {reason}")]
    CreateFailed { path: PathBuf, reason: String },
}

/// Create `path` if missing and check it is a directory.
pub fn ensure_directory(path: &Path) -> Result<PathBuf, PathError> {
    if path.exists() {
        if !path.is_dir() {
            return Err(PathError::NotADirectory(path.to_path_buf()));
        }
        return Ok(path.to_path_buf());
    }

    fs::create_dir_all(path).map_err(|e| PathError::CreateFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(path.to_path_buf())
}

/// Get the root directory for application data (database, partial files).
///
/// Defaults to the system data directory (e.g. `~/.local/share/rapid`).
pub fn data_root() -> Result<PathBuf, PathError> {
    if let Ok(path) = env::var(DATA_DIR_ENV) {
        return ensure_directory(Path::new(&path));
    }

    let data_dir = dirs::data_local_dir().ok_or(PathError::NoDataDir)?;
    ensure_directory(&data_dir.join("rapid"))
}

/// Get the path to the registry database file (`<data_root>/rapid.db`).
pub fn database_path() -> Result<PathBuf, PathError> {
    Ok(data_root()?.join("rapid.db"))
}

/// Get the directory finished downloads are moved into.
///
/// Falls back to `<data_root>/downloads` when the platform has no
/// downloads folder.
pub fn default_download_dir() -> Result<PathBuf, PathError> {
    if let Ok(path) = env::var(DOWNLOAD_DIR_ENV) {
        return ensure_directory(Path::new(&path));
    }

    match dirs::download_dir() {
        Some(dir) => ensure_directory(&dir),
        None => ensure_directory(&data_root()?.join("downloads")),
    }
}
