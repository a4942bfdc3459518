//! Synthetic video files on disk
//!
//! Content is deterministic per seed, so two files written with the same
//! seed and size are byte-identical and hash to the same digest.

use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

pub const KIB: usize = 1024;
pub const MIB: usize = 1024 * KIB;

/// Generate `size` bytes starting with an MP4 `ftyp` box
pub fn generate_video_content(size: usize, seed: u64) -> Vec<u8> {
    let mut data = Vec::with_capacity(size);

    // ftyp box: size, type, major brand, minor version, compatible brand
    data.extend_from_slice(&24u32.to_be_bytes());
    data.extend_from_slice(b"ftypisom");
    data.extend_from_slice(&[0x00, 0x00, 0x02, 0x00]);
    data.extend_from_slice(b"isommp41");

    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    let mut current = hasher.finish();
    while data.len() < size {
        current = current.wrapping_mul(6364136223846793005).wrapping_add(1);
        data.push((current >> 33) as u8);
    }

    data.truncate(size);
    data
}

/// Builder for a folder of fake videos
#[derive(Debug)]
pub struct VideoFixture {
    root: PathBuf,
}

impl VideoFixture {
    /// Use `root` as the scan folder, creating it if needed
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        fs::create_dir_all(&root).expect("create fixture folder");
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write a video of `size` bytes whose content is determined by `seed`
    pub fn video(&self, relative: &str, size: usize, seed: u64) -> PathBuf {
        self.write(relative, &generate_video_content(size, seed))
    }

    /// Write arbitrary bytes
    pub fn write(&self, relative: &str, content: &[u8]) -> PathBuf {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create fixture subfolder");
        }
        fs::write(&path, content).expect("write fixture file");
        path
    }

    /// Byte-identical copy of an existing fixture file
    pub fn copy(&self, from: &str, to: &str) -> PathBuf {
        let content = fs::read(self.root.join(from)).expect("read fixture file");
        self.write(to, &content)
    }
}
