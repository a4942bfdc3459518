//! Persistent digest cache
//!
//! Maps an absolute path to the digest computed for it together with the
//! size and modification time the file had at that moment. An entry is only
//! trusted when both still match exactly; otherwise the file is rehashed and
//! the entry overwritten.
//!
//! The cache is loaded once when a job starts and written once when it ends.
//! Concurrent jobs do not merge: the last one to save wins.

use crate::core::error::{Result, ScanError};
use crate::core::report::write_json_atomic;
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Stored identity of one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Hex SHA256 digest
    pub hash: String,
    /// Size in bytes when hashed
    pub size: u64,
    /// Modification time (seconds since the epoch) when hashed. Compared
    /// exactly, so serde_json must round-trip it bit for bit.
    pub mtime: f64,
}

/// Path -> digest cache backed by a JSON file
#[derive(Debug)]
pub struct ContentCache {
    path: PathBuf,
    entries: BTreeMap<String, CacheEntry>,
    dirty: bool,
}

impl ContentCache {
    /// Empty cache that will be written to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
            dirty: false,
        }
    }

    /// Load the cache file, starting empty if it is missing or unreadable
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let mut cache = Self::new(path);
        if !cache.path.exists() {
            return cache;
        }

        match Self::read_entries(&cache.path) {
            Ok(entries) => {
                debug!(
                    "Loaded {} cached digests from {}",
                    entries.len(),
                    cache.path.display()
                );
                cache.entries = entries;
            }
            Err(e) => warn!("Ignoring unreadable hash cache: {}", e),
        }
        cache
    }

    fn read_entries(path: &Path) -> Result<BTreeMap<String, CacheEntry>> {
        let json = fs::read_to_string(path).map_err(|e| ScanError::io(path, e))?;
        serde_json::from_str(&json)
            .map_err(|e| ScanError::Cache(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Cached digest for `path`, if size and mtime are unchanged
    pub fn lookup(&self, path: &Path, size: u64, mtime: f64) -> Option<&str> {
        let entry = self.entries.get(&cache_key(path))?;
        if entry.size == size && entry.mtime == mtime {
            trace!("Cache hit: {}", path.display());
            Some(entry.hash.as_str())
        } else {
            trace!("Stale cache entry: {}", path.display());
            None
        }
    }

    /// Record (or overwrite) the digest for `path`
    pub fn insert(&mut self, path: &Path, entry: CacheEntry) {
        let key = cache_key(path);
        if self.entries.get(&key) != Some(&entry) {
            self.entries.insert(key, entry);
            self.dirty = true;
        }
    }

    /// Write the cache file if anything changed since loading
    pub fn save(&mut self) -> Result<()> {
        if !self.dirty {
            trace!("Hash cache not modified, skipping save");
            return Ok(());
        }

        write_json_atomic(&self.path, &self.entries).map_err(|e| {
            ScanError::Cache(format!("Failed to write {}: {}", self.path.display(), e))
        })?;

        debug!(
            "Saved {} cached digests to {}",
            self.entries.len(),
            self.path.display()
        );
        self.dirty = false;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Modification time of a file as fractional seconds since the epoch
pub fn modified_secs(metadata: &Metadata) -> f64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

fn cache_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(hash: &str, size: u64, mtime: f64) -> CacheEntry {
        CacheEntry {
            hash: hash.to_string(),
            size,
            mtime,
        }
    }

    #[test]
    fn test_lookup_requires_exact_size_and_mtime() {
        let mut cache = ContentCache::new("/tmp/unused.json");
        let path = Path::new("/videos/a.mp4");
        cache.insert(path, entry("abc", 100, 1700000000.25));

        assert_eq!(cache.lookup(path, 100, 1700000000.25), Some("abc"));
        assert_eq!(cache.lookup(path, 101, 1700000000.25), None);
        assert_eq!(cache.lookup(path, 100, 1700000000.5), None);
        assert_eq!(cache.lookup(Path::new("/videos/b.mp4"), 100, 1700000000.25), None);
    }

    #[test]
    fn test_insert_overwrites_stale_entry() {
        let mut cache = ContentCache::new("/tmp/unused.json");
        let path = Path::new("/videos/a.mp4");
        cache.insert(path, entry("old", 1, 1.0));
        cache.insert(path, entry("new", 2, 2.0));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.lookup(path, 2, 2.0), Some("new"));
    }

    #[test]
    fn test_save_and_load_roundtrip_keeps_mtime_exact() {
        let temp_dir = TempDir::new().unwrap();
        let cache_file = temp_dir.path().join("nested").join("hash_cache.json");
        let mtime = 1712345678.123456_f64;

        let mut cache = ContentCache::load(&cache_file);
        assert!(cache.is_empty());
        cache.insert(Path::new("/videos/a.mp4"), entry("abc", 42, mtime));
        cache.save().unwrap();

        let reloaded = ContentCache::load(&cache_file);
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.lookup(Path::new("/videos/a.mp4"), 42, mtime), Some("abc"));
    }

    #[test]
    fn test_nanosecond_mtimes_survive_reload() {
        let temp_dir = TempDir::new().unwrap();
        let cache_file = temp_dir.path().join("hash_cache.json");

        let mut state = 0x9e37_79b9_7f4a_7c15_u64;
        let mut next = || {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            state >> 33
        };
        let mtimes: Vec<f64> = (0..20_000)
            .map(|_| {
                let secs = 1_600_000_000 + next() % 200_000_000;
                let nanos = (next() % 1_000_000_000) as u32;
                std::time::Duration::new(secs, nanos).as_secs_f64()
            })
            .collect();

        let mut cache = ContentCache::new(&cache_file);
        for (i, mtime) in mtimes.iter().enumerate() {
            let path = PathBuf::from(format!("/videos/{}.mp4", i));
            cache.insert(&path, entry("abc", i as u64, *mtime));
        }
        cache.save().unwrap();

        let reloaded = ContentCache::load(&cache_file);
        let misses = mtimes
            .iter()
            .enumerate()
            .filter(|(i, mtime)| {
                let path = PathBuf::from(format!("/videos/{}.mp4", i));
                reloaded.lookup(&path, *i as u64, **mtime).is_none()
            })
            .count();
        assert_eq!(misses, 0);
    }

    #[test]
    fn test_file_format_is_flat_path_map() {
        let temp_dir = TempDir::new().unwrap();
        let cache_file = temp_dir.path().join("hash_cache.json");

        let mut cache = ContentCache::new(&cache_file);
        cache.insert(Path::new("/videos/a.mp4"), entry("abc", 42, 10.0));
        cache.save().unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&cache_file).unwrap()).unwrap();
        assert_eq!(json["/videos/a.mp4"]["hash"], "abc");
        assert_eq!(json["/videos/a.mp4"]["size"], 42);
    }

    #[test]
    fn test_corrupted_cache_starts_empty() {
        let temp_dir = TempDir::new().unwrap();
        let cache_file = temp_dir.path().join("hash_cache.json");
        fs::write(&cache_file, b"{ invalid json content }").unwrap();

        let cache = ContentCache::load(&cache_file);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_unchanged_cache_is_not_rewritten() {
        let temp_dir = TempDir::new().unwrap();
        let cache_file = temp_dir.path().join("hash_cache.json");

        let mut cache = ContentCache::load(&cache_file);
        cache.save().unwrap();
        assert!(!cache_file.exists());
    }

    #[test]
    fn test_modified_secs_of_real_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.mp4");
        fs::write(&path, b"x").unwrap();

        let meta = fs::metadata(&path).unwrap();
        assert!(modified_secs(&meta) > 0.0);
        assert_eq!(modified_secs(&meta), modified_secs(&fs::metadata(&path).unwrap()));
    }
}
