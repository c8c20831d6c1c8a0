//! `SQLite` implementation of the `EntryRepositoryPort` trait.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteRow;

use rapid_core::{Download, DownloadId, EntryRepositoryPort, RepositoryError, Request, StoredEntry};

/// Persists registry entries so downloads survive restarts.
///
/// Each row keeps the creation sequence as a column and the download and
/// request snapshots as JSON.
pub struct SqliteEntryRepository {
    pool: SqlitePool,
}

impl SqliteEntryRepository {
    /// Create a repository over an initialized pool.
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[cfg(test)]
    const fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl EntryRepositoryPort for SqliteEntryRepository {
    async fn load_all(&self) -> Result<Vec<StoredEntry>, RepositoryError> {
        let rows = sqlx::query(
            r"
            SELECT id, seq, download, request
            FROM entries
            ORDER BY seq ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        rows.iter().map(row_to_entry).collect()
    }

    async fn save(&self, entry: &StoredEntry) -> Result<(), RepositoryError> {
        let download = serde_json::to_string(&entry.download)
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
        let request = serde_json::to_string(&entry.request)
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
        let seq = i64::try_from(entry.seq)
            .map_err(|_| RepositoryError::Storage(format!("sequence {} out of range", entry.seq)))?;

        sqlx::query(
            r"
            INSERT INTO entries (id, seq, status, download, request, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                download = excluded.download,
                request = excluded.request,
                updated_at = excluded.updated_at
            ",
        )
        .bind(entry.download.id.as_str())
        .bind(seq)
        .bind(entry.download.status.as_str())
        .bind(&download)
        .bind(&request)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        tracing::trace!(
            target: "rapid.db",
            id = %entry.download.id,
            status = entry.download.status.as_str(),
            "Entry saved"
        );
        Ok(())
    }

    async fn remove(&self, id: &DownloadId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM entries WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("Entry with ID '{id}'")));
        }
        Ok(())
    }
}

fn row_to_entry(row: &SqliteRow) -> Result<StoredEntry, RepositoryError> {
    use sqlx::Row;

    let id: String = row.try_get("id").map_err(map_column_error)?;
    let seq: i64 = row.try_get("seq").map_err(map_column_error)?;
    let download_json: String = row.try_get("download").map_err(map_column_error)?;
    let request_json: String = row.try_get("request").map_err(map_column_error)?;

    let download: Download = serde_json::from_str(&download_json)
        .map_err(|e| RepositoryError::Serialization(format!("entry '{id}': {e}")))?;
    let request: Request = serde_json::from_str(&request_json)
        .map_err(|e| RepositoryError::Serialization(format!("entry '{id}': {e}")))?;
    let seq = u64::try_from(seq)
        .map_err(|_| RepositoryError::Storage(format!("entry '{id}' has negative sequence")))?;

    Ok(StoredEntry {
        seq,
        download,
        request,
    })
}

fn map_column_error(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Storage(format!("Column read error: {e}"))
}
