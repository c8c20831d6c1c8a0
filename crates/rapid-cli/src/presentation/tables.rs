//! Table formatting for `rapid list`.

use indicatif::HumanBytes;
use rapid_core::Download;

const HEADER: [&str; 6] = ["ID", "NAME", "STATUS", "PROGRESS", "SIZE", "CREATED"];
const NAME_WIDTH: usize = 32;

/// Truncates a string to `max_len` characters, adding "..." if needed.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

fn row(download: &Download) -> [String; 6] {
    let status = if download.expired {
        format!("{} (expired)", download.status)
    } else {
        download.status.to_string()
    };
    let size = if download.size == 0 {
        "?".to_string()
    } else {
        HumanBytes(download.size).to_string()
    };
    [
        download.id.to_string(),
        truncate_string(&download.name, NAME_WIDTH),
        status,
        format!("{:.1}%", download.progress),
        size,
        download.date.format("%Y-%m-%d %H:%M").to_string(),
    ]
}

/// Render downloads as an aligned text table.
pub fn format_entries(downloads: &[Download]) -> String {
    let rows: Vec<[String; 6]> = downloads.iter().map(row).collect();

    let mut widths = HEADER.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let header = HEADER.map(str::to_string);
    for line in std::iter::once(&header).chain(&rows) {
        let cells: Vec<String> = line
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        out.push_str(cells.join("  ").trim_end());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rapid_core::{DownloadId, DownloadStatus, NewDownload};

    fn download(name: &str) -> Download {
        let mut d = Download::from_new(
            DownloadId::new("abc123"),
            NewDownload {
                name: name.to_string(),
                url: "https://example.com/a".into(),
                provider: "direct".into(),
                size: Some(4096),
                mime_type: "application/octet-stream".into(),
                chunk_len: 4,
                resumable: true,
            },
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap(),
        );
        d.progress = 42.5;
        d
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Hello", 10), "Hello");
        assert_eq!(truncate_string("Hello World", 8), "Hello...");
    }

    #[test]
    fn test_table_has_header_and_rows() {
        let mut paused = download("movie.mkv");
        paused.status = DownloadStatus::Paused;
        paused.expired = true;

        let table = format_entries(&[download("a.iso"), paused]);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("ID"));
        assert!(lines[1].contains("a.iso"));
        assert!(lines[1].contains("queued"));
        assert!(lines[1].contains("42.5%"));
        assert!(lines[1].contains("4.00 KiB"));
        assert!(lines[1].contains("2024-03-01 12:30"));
        assert!(lines[2].contains("paused (expired)"));
    }

    #[test]
    fn test_empty_table_is_header_only() {
        assert_eq!(format_entries(&[]).lines().count(), 1);
    }
}
