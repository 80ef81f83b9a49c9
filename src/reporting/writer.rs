//! CSV rendering and file placement

use chrono::NaiveDateTime;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::models::ReportRow;

pub const CSV_HEADER: [&str; 2] = ["Local Time", "Volume"];

/// `<dir>/PowerPosition_<yyyyMMdd_HHmm>.csv` for the requested (not day-ahead) time
pub fn report_filename(dir: &Path, point_in_time: NaiveDateTime) -> PathBuf {
    dir.join(format!(
        "PowerPosition_{}.csv",
        point_in_time.format("%Y%m%d_%H%M")
    ))
}

pub fn render_csv(rows: &[ReportRow]) -> io::Result<Vec<u8>> {
    let mut wtr = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::with_capacity(32 + rows.len() * 16));

    wtr.write_record(CSV_HEADER)?;
    for row in rows {
        wtr.write_record([
            row.local_time.format("%H:%M").to_string(),
            row.volume.to_string(),
        ])?;
    }

    wtr.into_inner().map_err(|e| e.into_error())
}

/// Write `bytes` beside `path` and rename into place so readers never see a
/// half-written report. If anything fails the partial file is removed, and a
/// failed removal is logged.
pub async fn write_atomically(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let partial = partial_path(path);

    let result = async {
        tokio::fs::write(&partial, bytes).await?;
        tokio::fs::rename(&partial, path).await
    }
    .await;

    if result.is_err() {
        if let Err(e) = tokio::fs::remove_file(&partial).await {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(partial = %partial.display(), "Failed to remove partial report: {}", e);
            }
        }
    }
    result
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_filename_uses_minute_resolution() {
        let dir = Path::new("/reports");
        let a = report_filename(dir, at(23, 30));
        let b = report_filename(dir, at(23, 30) + chrono::Duration::seconds(42));
        let c = report_filename(dir, at(23, 31));

        assert_eq!(a, PathBuf::from("/reports/PowerPosition_20240115_2330.csv"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_render_csv_layout() {
        let rows = vec![
            ReportRow { local_time: at(23, 0), volume: 15.0 },
            ReportRow { local_time: at(0, 0), volume: -3.25 },
        ];

        let text = String::from_utf8(render_csv(&rows).unwrap()).unwrap();
        assert_eq!(text, "Local Time,Volume\n23:00,15\n00:00,-3.25\n");
    }

    #[test]
    fn test_render_csv_header_only() {
        let text = String::from_utf8(render_csv(&[]).unwrap()).unwrap();
        assert_eq!(text, "Local Time,Volume\n");
    }

    #[tokio::test]
    async fn test_failed_rename_removes_partial() {
        let dir = tempfile::TempDir::new().unwrap();
        let target = dir.path().join("PowerPosition_20240115_2330.csv");
        std::fs::create_dir(&target).unwrap();

        assert!(write_atomically(&target, b"Local Time,Volume\n").await.is_err());
        assert!(!partial_path(&target).exists());
    }

    #[tokio::test]
    async fn test_missing_directory_write_fails_cleanly() {
        let dir = tempfile::TempDir::new().unwrap();
        let target = dir.path().join("missing").join("PowerPosition_20240115_2330.csv");

        let err = write_atomically(&target, b"x").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_partial_path_is_sibling() {
        let p = partial_path(Path::new("/reports/PowerPosition_20240115_2330.csv"));
        assert_eq!(p, PathBuf::from("/reports/PowerPosition_20240115_2330.csv.partial"));
    }
}
