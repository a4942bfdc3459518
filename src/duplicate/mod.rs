//! Duplicate detection module
//!
//! Content identity for scanned videos: streaming SHA256 digests, the
//! persistent digest cache that lets unchanged files skip rehashing, and the
//! accumulator that groups records by digest.
//!
//! # Submodules
//!
//! - `hasher` - Chunked, pausable SHA256 hashing
//! - `cache` - Path -> (digest, size, mtime) cache file
//! - `accumulator` - Digest groups and duplicate statistics

pub mod accumulator;
pub mod cache;
pub mod hasher;

pub use accumulator::{DuplicateAccumulator, DuplicateStats, FileRecord};
pub use cache::{modified_secs, CacheEntry, ContentCache};
pub use hasher::{compute_data_hash, hash_file, hash_to_hex, Sha256Hash};
