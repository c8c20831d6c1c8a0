//! `rapid list`: print persisted downloads.

use anyhow::Result;
use rapid_core::{Download, StoredEntry};

use crate::bootstrap::{CliConfig, open_repository};
use crate::presentation::format_entries;

/// Downloads on a 1-based page of persisted entries, in creation order.
pub fn page_of(entries: Vec<StoredEntry>, page: u32, page_size: usize) -> Vec<Download> {
    let skip = (page.max(1) as usize - 1).saturating_mul(page_size.max(1));
    entries
        .into_iter()
        .skip(skip)
        .take(page_size.max(1))
        .map(|entry| entry.download)
        .collect()
}

/// Print one page of the durable registry.
pub async fn execute(config: &CliConfig, page: u32) -> Result<()> {
    let repository = open_repository(config).await?;
    let entries = repository.load_all().await?;
    let total = entries.len();
    let downloads = page_of(entries, page, config.engine.page_size);

    if downloads.is_empty() {
        println!("No downloads.");
        return Ok(());
    }
    print!("{}", format_entries(&downloads));
    println!("{} of {total} downloads", downloads.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rapid_core::{DownloadId, NewDownload, Request};

    fn entries(n: u64) -> Vec<StoredEntry> {
        (0..n)
            .map(|seq| {
                let download = Download::from_new(
                    DownloadId::new(format!("d{seq}")),
                    NewDownload {
                        name: format!("{seq}.bin"),
                        url: "https://example.com".into(),
                        provider: "direct".into(),
                        size: None,
                        mime_type: "application/octet-stream".into(),
                        chunk_len: 1,
                        resumable: false,
                    },
                    Utc::now(),
                );
                StoredEntry {
                    seq,
                    download,
                    request: Request::new("https://example.com"),
                }
            })
            .collect()
    }

    #[test]
    fn test_page_of() {
        let ids = |downloads: Vec<Download>| {
            downloads
                .into_iter()
                .map(|d| d.id.to_string())
                .collect::<Vec<_>>()
        };
        assert_eq!(ids(page_of(entries(5), 1, 2)), vec!["d0", "d1"]);
        assert_eq!(ids(page_of(entries(5), 3, 2)), vec!["d4"]);
        assert!(page_of(entries(5), 4, 2).is_empty());
        assert_eq!(ids(page_of(entries(2), 0, 2)), vec!["d0", "d1"]);
    }
}
