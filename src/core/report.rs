//! Per-job scan report
//!
//! The report is rewritten after every hashed file so that an interrupted scan
//! still leaves a usable record behind. Writes go through a temporary sibling
//! and a rename, so readers never observe a half-written file.

use crate::core::error::{Result, ScanError};
use crate::duplicate::FileRecord;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Durable result of one scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub scanned_folder: PathBuf,
    /// Local time of the last write, ISO-8601 to the second
    pub scanned_at: String,
    /// Every record produced so far, in hashing order
    pub videos: Vec<FileRecord>,
    /// Digest -> records, only for groups larger than one
    pub duplicates: BTreeMap<String, Vec<FileRecord>>,
    /// "processed/total"
    pub progress: String,
    pub dup_bytes: u64,
}

impl ScanReport {
    pub fn new(
        scanned_folder: &Path,
        videos: Vec<FileRecord>,
        duplicates: BTreeMap<String, Vec<FileRecord>>,
        processed: usize,
        total: usize,
        dup_bytes: u64,
    ) -> Self {
        Self {
            scanned_folder: scanned_folder.to_path_buf(),
            scanned_at: timestamp(Local::now()),
            videos,
            duplicates,
            progress: format!("{}/{}", processed, total),
            dup_bytes,
        }
    }

    /// Refresh `scanned_at` to now
    pub fn touch(&mut self) {
        self.scanned_at = timestamp(Local::now());
    }

    /// Atomically replace the report at `path`
    pub fn write_to(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self)
            .map_err(|e| ScanError::Report(format!("Failed to write {}: {}", path.display(), e)))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| ScanError::io(path, e))?;
        serde_json::from_str(&json)
            .map_err(|e| ScanError::Report(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// First record of each digest, in hashing order
    pub fn unique_videos(&self) -> Vec<&FileRecord> {
        let mut seen = HashSet::new();
        self.videos
            .iter()
            .filter(|v| seen.insert(v.digest.as_str()))
            .collect()
    }

    /// Records that are redundant copies of an earlier one
    pub fn redundant_videos(&self) -> Vec<&FileRecord> {
        self.duplicates
            .values()
            .flat_map(|group| group.iter().skip(1))
            .collect()
    }
}

fn timestamp(now: DateTime<Local>) -> String {
    now.format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Serialize `value` as pretty JSON to a uniquely named temporary sibling of
/// `path`, then rename it into place. Concurrent writers never share a temp
/// file, so the last rename wins.
pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> io::Result<()> {
    let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            fs::create_dir_all(parent)?;
            parent
        }
        None => Path::new("."),
    };

    let json = serde_json::to_string_pretty(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(json.as_bytes())?;
    tmp.persist(path).map(|_| ()).map_err(|e| e.error)
}
