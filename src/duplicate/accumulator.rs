//! Incremental duplicate grouping
//!
//! Records are grouped by digest as they complete. A group of one is not a
//! duplicate. Groups only ever grow during a scan.
//!
//! Duplicate bytes count every member of every group larger than one, so two
//! identical 2 MB files account for 4 MB. The running total is bumped when a
//! group reaches two members (both sizes) and by the newcomer's size after
//! that, which keeps it equal to a full recount at every step. Group count
//! and largest group are recomputed from the mapping on every update.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// One scanned video
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Absolute path at hashing time
    pub path: PathBuf,
    /// File name
    pub name: String,
    /// Hex SHA256 digest of the content
    #[serde(rename = "hash")]
    pub digest: String,
    /// Size in bytes
    pub size: u64,
    /// Thumbnail file name (in the thumbnails directory)
    #[serde(rename = "thumb")]
    pub thumbnail: String,
    /// Preview clip file name, absent when the clip could not be produced
    #[serde(rename = "prev")]
    pub preview: Option<String>,
}

/// Aggregate duplicate figures after an update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateStats {
    /// Sum of sizes of all members of groups larger than one
    pub duplicate_bytes: u64,
    /// Number of groups larger than one
    pub dup_groups: usize,
    /// Size of the largest group (1 when nothing was grouped yet)
    pub largest_group: usize,
}

impl Default for DuplicateStats {
    fn default() -> Self {
        Self {
            duplicate_bytes: 0,
            dup_groups: 0,
            largest_group: 1,
        }
    }
}

/// Digest -> records mapping built during the hashing stage
#[derive(Debug, Default)]
pub struct DuplicateAccumulator {
    groups: HashMap<String, Vec<FileRecord>>,
    records: usize,
    duplicate_bytes: u64,
}

impl DuplicateAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a completed record and return the refreshed statistics
    pub fn add(&mut self, record: FileRecord) -> DuplicateStats {
        let size = record.size;
        let group = self.groups.entry(record.digest.clone()).or_default();
        group.push(record);
        self.records += 1;

        match group.len() {
            1 => {}
            2 => self.duplicate_bytes += group[0].size + size,
            _ => self.duplicate_bytes += size,
        }

        self.stats()
    }

    /// Current statistics
    pub fn stats(&self) -> DuplicateStats {
        DuplicateStats {
            duplicate_bytes: self.duplicate_bytes,
            dup_groups: self.groups.values().filter(|g| g.len() > 1).count(),
            largest_group: self.groups.values().map(Vec::len).max().unwrap_or(1),
        }
    }

    /// Duplicate bytes recounted from scratch
    pub fn recount_duplicate_bytes(&self) -> u64 {
        self.groups
            .values()
            .filter(|g| g.len() > 1)
            .flat_map(|g| g.iter().map(|r| r.size))
            .sum()
    }

    /// Records sharing `digest`, in arrival order
    pub fn group(&self, digest: &str) -> Option<&[FileRecord]> {
        self.groups.get(digest).map(Vec::as_slice)
    }

    /// All groups larger than one, keyed by digest
    pub fn duplicate_groups(&self) -> BTreeMap<String, Vec<FileRecord>> {
        self.groups
            .iter()
            .filter(|(_, g)| g.len() > 1)
            .map(|(digest, g)| (digest.clone(), g.clone()))
            .collect()
    }

    /// Number of distinct digests
    pub fn unique_digests(&self) -> usize {
        self.groups.len()
    }

    /// Number of records added
    pub fn len(&self) -> usize {
        self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: u64 = 1024 * 1024;

    fn record(name: &str, digest: &str, size: u64) -> FileRecord {
        FileRecord {
            path: PathBuf::from(format!("/videos/{}", name)),
            name: name.to_string(),
            digest: digest.to_string(),
            size,
            thumbnail: format!("{}.jpg", digest),
            preview: Some(format!("{}.mp4", digest)),
        }
    }

    #[test]
    fn test_empty_accumulator() {
        let acc = DuplicateAccumulator::new();
        assert!(acc.is_empty());
        assert_eq!(acc.stats(), DuplicateStats::default());
        assert_eq!(acc.stats().largest_group, 1);
    }

    #[test]
    fn test_pair_and_unique_file() {
        let mut acc = DuplicateAccumulator::new();
        acc.add(record("a.mp4", "aaa", 2 * MB));
        let after_b = acc.add(record("b.mp4", "aaa", 2 * MB));
        assert_eq!(after_b.duplicate_bytes, 4 * MB);

        let stats = acc.add(record("c.mp4", "ccc", 3 * MB));
        assert_eq!(stats.duplicate_bytes, 4 * MB);
        assert_eq!(stats.dup_groups, 1);
        assert_eq!(stats.largest_group, 2);
        assert_eq!(acc.len(), 3);
        assert_eq!(acc.unique_digests(), 2);
    }

    #[test]
    fn test_single_file_is_not_a_duplicate() {
        let mut acc = DuplicateAccumulator::new();
        let stats = acc.add(record("a.mp4", "aaa", 10));
        assert_eq!(stats.duplicate_bytes, 0);
        assert_eq!(stats.dup_groups, 0);
        assert_eq!(stats.largest_group, 1);
        assert!(acc.duplicate_groups().is_empty());
    }

    #[test]
    fn test_running_total_matches_recount_as_groups_grow() {
        let mut acc = DuplicateAccumulator::new();
        let inputs = [
            ("a", "x", 5),
            ("b", "y", 7),
            ("c", "x", 5),
            ("d", "x", 5),
            ("e", "y", 7),
            ("f", "z", 1),
            ("g", "x", 5),
        ];

        for (name, digest, size) in inputs {
            let stats = acc.add(record(name, digest, size));
            assert_eq!(stats.duplicate_bytes, acc.recount_duplicate_bytes());
        }

        let stats = acc.stats();
        assert_eq!(stats.duplicate_bytes, 4 * 5 + 2 * 7);
        assert_eq!(stats.dup_groups, 2);
        assert_eq!(stats.largest_group, 4);
    }

    #[test]
    fn test_groups_keep_arrival_order() {
        let mut acc = DuplicateAccumulator::new();
        acc.add(record("second.mp4", "d", 1));
        acc.add(record("first.mp4", "d", 1));

        let names: Vec<_> = acc.group("d").unwrap().iter().map(|r| &r.name).collect();
        assert_eq!(names, ["second.mp4", "first.mp4"]);

        let groups = acc.duplicate_groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups["d"].len(), 2);
    }

    #[test]
    fn test_record_serializes_with_report_keys() {
        let json = serde_json::to_value(record("a.mp4", "abc", 3)).unwrap();
        assert_eq!(json["hash"], "abc");
        assert_eq!(json["thumb"], "abc.jpg");
        assert_eq!(json["prev"], "abc.mp4");
        assert_eq!(json["name"], "a.mp4");
    }
}
