//! Database setup and initialization.
//!
//! Entry points call [`setup_database`] with the resolved database path.

use std::path::Path;

use anyhow::Result;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};

/// Opens (creating if needed) the database at `db_path` and ensures the
/// schema exists.
///
/// # Example
///
/// ```rust,no_run
/// use rapid_db::setup_database;
/// use std::path::Path;
///
/// # async fn example() -> anyhow::Result<()> {
/// let pool = setup_database(Path::new("/path/to/rapid.db")).await?;
/// # Ok(())
/// # }
/// ```
pub async fn setup_database(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let pool = SqlitePool::connect_with(
        SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal),
    )
    .await?;

    create_schema(&pool).await?;
    tracing::debug!(target: "rapid.db", path = %db_path.display(), "Database ready");
    Ok(pool)
}

/// Sets up an in-memory database for testing.
///
/// Limited to one connection so every query sees the same memory database.
#[cfg(any(test, feature = "test-utils"))]
pub async fn setup_test_database() -> Result<SqlitePool> {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    create_schema(&pool).await?;
    Ok(pool)
}

/// Creates the schema. Safe to call repeatedly.
async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS entries (
            id TEXT PRIMARY KEY NOT NULL,
            seq INTEGER NOT NULL,
            status TEXT NOT NULL,
            download TEXT NOT NULL,
            request TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        ",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_entries_seq ON entries(seq)")
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Row;

    #[tokio::test]
    async fn test_setup_creates_file_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("rapid.db");

        let pool = setup_database(&path).await.unwrap();
        assert!(path.exists());

        let row = sqlx::query("SELECT COUNT(*) AS n FROM entries")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(row.get::<i64, _>("n"), 0);
    }

    #[tokio::test]
    async fn test_setup_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rapid.db");

        let first = setup_database(&path).await.unwrap();
        first.close().await;
        setup_database(&path).await.unwrap();
    }
}
