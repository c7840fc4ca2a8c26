//! Segment files and day folder naming
//!
//! ```text
//! {root}/
//! ├── 2024-03-09/
//! │   ├── 08-15-02.h264
//! │   └── 13-40-57.h264
//! └── 2024-03-10/
//!     └── 00-00-01.h264
//! ```

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::error::{Error, Result};

/// Folder name for a calendar date (`YYYY-MM-DD`)
pub fn day_folder_name(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Segment file name for a time of day (`HH-MM-SS.ext`)
pub fn segment_file_name(time: NaiveDateTime, extension: &str) -> String {
    format!("{}.{}", time.format("%H-%M-%S"), extension)
}

/// The currently open segment file
#[derive(Debug)]
pub struct Segment {
    path: PathBuf,
    file: File,
    opened_at: NaiveDateTime,
    bytes: u64,
    chunks: u64,
}

impl Segment {
    /// Open `path` for appending, creating it if needed
    ///
    /// An existing file (same-second name collision) is appended to.
    pub async fn open(path: PathBuf, opened_at: NaiveDateTime) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| Error::filesystem(&path, e))?;

        Ok(Self {
            path,
            file,
            opened_at,
            bytes: 0,
            chunks: 0,
        })
    }

    /// Append bytes and flush them to the OS
    pub async fn append(&mut self, data: &[u8]) -> Result<()> {
        self.file
            .write_all(data)
            .await
            .map_err(|e| Error::filesystem(&self.path, e))?;
        self.file
            .flush()
            .await
            .map_err(|e| Error::filesystem(&self.path, e))?;

        self.bytes += data.len() as u64;
        self.chunks += 1;
        Ok(())
    }

    /// Flush, sync and close the file
    pub async fn close(mut self) -> Result<SegmentSummary> {
        self.file
            .flush()
            .await
            .map_err(|e| Error::filesystem(&self.path, e))?;
        self.file
            .sync_all()
            .await
            .map_err(|e| Error::filesystem(&self.path, e))?;

        Ok(SegmentSummary {
            path: self.path,
            opened_at: self.opened_at,
            bytes: self.bytes,
            chunks: self.chunks,
        })
    }

    /// Path of the segment file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes appended since open
    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

/// What a closed segment contained
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentSummary {
    pub path: PathBuf,
    pub opened_at: NaiveDateTime,
    pub bytes: u64,
    pub chunks: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn test_names_are_zero_padded() {
        let time = at(2024, 3, 9, 8, 5, 2);
        assert_eq!(day_folder_name(time.date()), "2024-03-09");
        assert_eq!(segment_file_name(time, "h264"), "08-05-02.h264");
    }

    #[tokio::test]
    async fn test_append_and_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("10-00-00.h264");

        let mut segment = Segment::open(path.clone(), at(2024, 1, 1, 10, 0, 0))
            .await
            .unwrap();
        segment.append(b"AAA").await.unwrap();
        segment.append(b"BBB").await.unwrap();
        let summary = segment.close().await.unwrap();

        assert_eq!(summary.bytes, 6);
        assert_eq!(summary.chunks, 2);
        assert_eq!(std::fs::read(&path).unwrap(), b"AAABBB");
    }

    #[tokio::test]
    async fn test_reopen_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("10-00-00.h264");
        let time = at(2024, 1, 1, 10, 0, 0);

        let mut first = Segment::open(path.clone(), time).await.unwrap();
        first.append(b"one").await.unwrap();
        first.close().await.unwrap();

        let mut second = Segment::open(path.clone(), time).await.unwrap();
        second.append(b"two").await.unwrap();
        second.close().await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"onetwo");
    }

    #[tokio::test]
    async fn test_open_in_missing_folder_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("10-00-00.h264");

        let err = Segment::open(path, at(2024, 1, 1, 10, 0, 0))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Filesystem { .. }));
    }
}
