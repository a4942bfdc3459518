//! Media tool abstraction for testability
//!
//! Thumbnails and preview clips come from an external transcoder. This trait
//! is the seam between the derivative generator and that tool, so the real
//! ffmpeg-backed implementation and the mock from `testdb` can be used
//! interchangeably.

use crate::core::error::Result;
use std::path::Path;

/// Operations the derivative generator needs from a transcoder
pub trait MediaTool: Send + Sync {
    /// Duration of the source in seconds, `None` if it cannot be determined
    fn probe_duration(&self, source: &Path) -> Option<f64>;

    /// Write a single still frame taken at `seek_secs`, scaled to `width`
    fn extract_frame(&self, source: &Path, seek_secs: f64, width: u32, dest: &Path)
        -> Result<()>;

    /// Write a silent clip of `seconds` starting at `seek_secs`, scaled to `width`
    fn extract_clip(
        &self,
        source: &Path,
        seek_secs: f64,
        seconds: u32,
        width: u32,
        dest: &Path,
    ) -> Result<()>;
}
