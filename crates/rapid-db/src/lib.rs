//! `SQLite` persistence for the download registry.
//!
//! The engine only sees [`rapid_core::EntryRepositoryPort`]; the pool and all
//! SQL stay inside this crate.
#![deny(unused_crate_dependencies)]

pub mod repositories;
pub mod setup;

// Linked for the bundled SQLite build only.
use libsqlite3_sys as _;

pub use repositories::SqliteEntryRepository;

pub use setup::setup_database;
#[cfg(any(test, feature = "test-utils"))]
pub use setup::setup_test_database;
