//! File-backed chunk storage.
//!
//! Partial data lives in `<staging>/<id>.part`. Every chunk writer opens its
//! own handle and seeks to its offset, so workers never share a cursor.
//! Finalize verifies the size and moves the file into the download directory.

use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

use rapid_core::ports::{ChunkStorage, ChunkWriter};
use rapid_core::{DownloadId, StorageError};

/// Stores partial downloads on the local file system.
#[derive(Debug, Clone)]
pub struct FileStorage {
    staging_dir: PathBuf,
    download_dir: PathBuf,
}

impl FileStorage {
    /// Create storage with separate staging and destination directories.
    pub fn new(staging_dir: impl Into<PathBuf>, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            download_dir: download_dir.into(),
        }
    }

    /// Path of the partial file for a download.
    #[must_use]
    pub fn part_path(&self, id: &DownloadId) -> PathBuf {
        self.staging_dir.join(format!("{id}.part"))
    }
}

struct FileChunkWriter {
    file: File,
}

#[async_trait]
impl ChunkWriter for FileChunkWriter {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), StorageError> {
        self.file.write_all(bytes).await.map_err(StorageError::from)
    }

    async fn flush(&mut self) -> Result<(), StorageError> {
        self.file.flush().await.map_err(StorageError::from)
    }
}

#[async_trait]
impl ChunkStorage for FileStorage {
    async fn prepare(&self, id: &DownloadId, _size: Option<u64>) -> Result<(), StorageError> {
        fs::create_dir_all(&self.staging_dir).await?;
        OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.part_path(id))
            .await?;
        Ok(())
    }

    async fn open_writer(
        &self,
        id: &DownloadId,
        offset: u64,
    ) -> Result<Box<dyn ChunkWriter>, StorageError> {
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.part_path(id))
            .await?;
        file.seek(SeekFrom::Start(offset)).await?;
        Ok(Box::new(FileChunkWriter { file }))
    }

    async fn truncate(&self, id: &DownloadId) -> Result<(), StorageError> {
        match OpenOptions::new().write(true).open(self.part_path(id)).await {
            Ok(file) => file.set_len(0).await.map_err(StorageError::from),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn discard(&self, id: &DownloadId) -> Result<(), StorageError> {
        match fs::remove_file(self.part_path(id)).await {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    async fn finalize(
        &self,
        id: &DownloadId,
        file_name: &str,
        expected_size: Option<u64>,
    ) -> Result<PathBuf, StorageError> {
        let part = self.part_path(id);
        let actual = fs::metadata(&part).await?.len();
        if let Some(expected) = expected_size {
            if actual != expected {
                return Err(StorageError::new(
                    "InvalidData",
                    format!("expected {expected} bytes, found {actual}"),
                ));
            }
        }

        fs::create_dir_all(&self.download_dir).await?;
        let destination = unique_destination(&self.download_dir, &sanitize_file_name(file_name)).await;
        if let Err(e) = fs::rename(&part, &destination).await {
            // Cross-device moves fall back to copy + remove.
            tracing::debug!(target: "rapid.download", error = %e, "Rename failed, copying instead");
            fs::copy(&part, &destination).await?;
            fs::remove_file(&part).await?;
        }
        Ok(destination)
    }
}

/// Strip path separators and control characters from a server-supplied name.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim().trim_matches('.');
    if trimmed.is_empty() {
        "download".to_string()
    } else {
        trimmed.to_string()
    }
}

async fn unique_destination(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if fs::try_exists(&candidate).await.ok() != Some(true) {
        return candidate;
    }

    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };
    let mut n = 1_u32;
    loop {
        let numbered = ext.map_or_else(
            || format!("{stem} ({n})"),
            |ext| format!("{stem} ({n}).{ext}"),
        );
        let candidate = dir.join(numbered);
        if fs::try_exists(&candidate).await.ok() != Some(true) {
            return candidate;
        }
        n = n.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(tmp: &tempfile::TempDir) -> FileStorage {
        FileStorage::new(tmp.path().join("staging"), tmp.path().join("done"))
    }

    #[tokio::test]
    async fn test_disjoint_writers_assemble_file() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = storage(&tmp);
        let id = DownloadId::new("abc");
        storage.prepare(&id, Some(10)).await.unwrap();

        let mut second = storage.open_writer(&id, 5).await.unwrap();
        second.write(b"56789").await.unwrap();
        second.flush().await.unwrap();
        let mut first = storage.open_writer(&id, 0).await.unwrap();
        first.write(b"01234").await.unwrap();
        first.flush().await.unwrap();
        drop((first, second));

        let path = storage.finalize(&id, "digits.txt", Some(10)).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"0123456789");
        assert!(path.ends_with("digits.txt"));
        assert!(!storage.part_path(&id).exists());
    }

    #[tokio::test]
    async fn test_finalize_rejects_size_mismatch() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = storage(&tmp);
        let id = DownloadId::new("short");
        storage.prepare(&id, Some(10)).await.unwrap();
        let mut writer = storage.open_writer(&id, 0).await.unwrap();
        writer.write(b"abc").await.unwrap();
        writer.flush().await.unwrap();
        drop(writer);

        let err = storage.finalize(&id, "x.bin", Some(10)).await.unwrap_err();
        assert_eq!(err.kind, "InvalidData");
    }

    #[tokio::test]
    async fn test_truncate_and_discard() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = storage(&tmp);
        let id = DownloadId::new("t");
        storage.prepare(&id, None).await.unwrap();
        let mut writer = storage.open_writer(&id, 0).await.unwrap();
        writer.write(b"partial").await.unwrap();
        writer.flush().await.unwrap();
        drop(writer);

        storage.truncate(&id).await.unwrap();
        assert_eq!(std::fs::metadata(storage.part_path(&id)).unwrap().len(), 0);

        storage.discard(&id).await.unwrap();
        assert!(!storage.part_path(&id).exists());
        storage.discard(&id).await.unwrap();
    }

    #[tokio::test]
    async fn test_existing_destination_gets_numbered() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = storage(&tmp);
        std::fs::create_dir_all(tmp.path().join("done")).unwrap();
        std::fs::write(tmp.path().join("done").join("a.txt"), b"old").unwrap();

        let id = DownloadId::new("n");
        storage.prepare(&id, None).await.unwrap();
        let path = storage.finalize(&id, "a.txt", None).await.unwrap();
        assert!(path.ends_with("a (1).txt"));
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(sanitize_file_name("  "), "download");
        assert_eq!(sanitize_file_name("ok.zip"), "ok.zip");
    }
}
