//! Streaming SHA256 digests
//!
//! Files are read in fixed-size chunks. After every chunk the job's control is
//! consulted: a stop abandons the digest, a pause blocks until resumed. The
//! digest is the sole content identity used for duplicate grouping, so two
//! files with the same bytes always produce the same hex string regardless of
//! name, location or timestamps.

use crate::core::error::{Result, ScanError};
use crate::core::job::JobControl;
use log::trace;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

/// SHA256 hash represented as a fixed-size array
pub type Sha256Hash = [u8; 32];

/// Hash a whole file, reporting per-file progress.
///
/// `on_progress` receives the percent of the file hashed so far (0-100). It is
/// non-decreasing and ends at exactly 100; an empty file reports 100 at once.
///
/// Returns `Ok(None)` when the job was stopped before the last chunk was
/// consumed. The partial digest is discarded and must not be recorded.
pub fn hash_file<F>(
    path: &Path,
    chunk_size: usize,
    control: &JobControl,
    mut on_progress: F,
) -> Result<Option<String>>
where
    F: FnMut(f64),
{
    let mut file = File::open(path).map_err(|e| ScanError::io(path, e))?;
    let size = file.metadata().map_err(|e| ScanError::io(path, e))?.len();

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; chunk_size.max(1)];
    let mut done: u64 = 0;
    let mut reported = 0.0_f64;

    if size == 0 {
        reported = 100.0;
        on_progress(reported);
    }

    loop {
        let bytes_read = match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(ScanError::io(path, e)),
        };

        hasher.update(&buffer[..bytes_read]);
        done += bytes_read as u64;

        let pct = percent(done, size).max(reported);
        if pct > reported {
            reported = pct;
            on_progress(reported);
        }

        if !control.checkpoint() {
            trace!(
                "Hashing of {} stopped after {} of {} bytes",
                path.display(),
                done,
                size
            );
            return Ok(None);
        }
    }

    // The file may have shrunk while we were reading it
    if reported < 100.0 {
        on_progress(100.0);
    }

    Ok(Some(hash_to_hex(&finalize(hasher))))
}

/// Compute SHA256 hash of in-memory data
pub fn compute_data_hash(data: &[u8]) -> Sha256Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    finalize(hasher)
}

/// Convert a hash to a hexadecimal string
pub fn hash_to_hex(hash: &Sha256Hash) -> String {
    hash.iter().map(|b| format!("{:02x}", b)).collect()
}

fn finalize(hasher: Sha256) -> Sha256Hash {
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

fn percent(done: u64, size: u64) -> f64 {
    if size == 0 {
        100.0
    } else {
        (done as f64 * 100.0 / size as f64).min(100.0)
    }
}
