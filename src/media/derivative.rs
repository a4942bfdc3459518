//! Thumbnail and preview generation
//!
//! Derivatives are named by a tag (file stem before hashing, digest after)
//! and live in two shared directories. An existing file is never regenerated.
//! Two jobs racing on the same tag may both transcode; the last write wins and
//! either result is valid.

use crate::core::config::ScanSettings;
use crate::core::error::{Result, ScanError};
use crate::media::traits::MediaTool;
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use log::{debug, warn};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const PLACEHOLDER_QUALITY: u8 = 85;

/// Produces thumbnails and preview clips for source videos
#[derive(Clone)]
pub struct DerivativeGenerator {
    tool: Arc<dyn MediaTool>,
    thumb_dir: PathBuf,
    preview_dir: PathBuf,
    width: u32,
    preview_seconds: u32,
    placeholder_size: (u32, u32),
    placeholder_color: [u8; 3],
    fallback_duration_secs: f64,
}

impl DerivativeGenerator {
    pub fn new(tool: Arc<dyn MediaTool>, settings: &ScanSettings) -> Self {
        Self {
            tool,
            thumb_dir: settings.thumb_dir.clone(),
            preview_dir: settings.preview_dir.clone(),
            width: settings.thumbnail_width,
            preview_seconds: settings.preview_seconds,
            placeholder_size: settings.placeholder_size,
            placeholder_color: settings.placeholder_color,
            fallback_duration_secs: settings.fallback_duration_secs,
        }
    }

    /// Create both output directories
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.thumb_dir, &self.preview_dir] {
            fs::create_dir_all(dir).map_err(|e| ScanError::io(dir, e))?;
        }
        Ok(())
    }

    pub fn thumbnail_path(&self, tag: &str) -> PathBuf {
        self.thumb_dir.join(format!("{}.jpg", tag))
    }

    pub fn preview_path(&self, tag: &str) -> PathBuf {
        self.preview_dir.join(format!("{}.mp4", tag))
    }

    /// Midpoint of the source, or of the fallback duration when probing fails
    pub fn seek_offset(&self, source: &Path) -> f64 {
        let duration = self
            .tool
            .probe_duration(source)
            .unwrap_or(self.fallback_duration_secs);
        duration / 2.0
    }

    /// Thumbnail file name for `source`, generating it if missing.
    ///
    /// A failed frame grab is replaced by a solid placeholder image, so a
    /// name is always returned.
    pub fn thumbnail(&self, source: &Path, tag: &str) -> String {
        let dest = self.thumbnail_path(tag);
        let name = file_name(&dest);
        if dest.exists() {
            return name;
        }

        let seek = self.seek_offset(source);
        let produced = match self.tool.extract_frame(source, seek, self.width, &dest) {
            Ok(()) => dest.exists(),
            Err(e) => {
                debug!("Thumbnail extraction failed for {}: {}", source.display(), e);
                false
            }
        };

        if !produced {
            if let Err(e) = self.write_placeholder(&dest) {
                warn!("Could not write placeholder thumbnail {}: {}", dest.display(), e);
            }
        }
        name
    }

    /// Preview clip file name for `source`, or `None` if it could not be made
    pub fn preview(&self, source: &Path, tag: &str) -> Option<String> {
        let dest = self.preview_path(tag);
        if dest.exists() {
            return Some(file_name(&dest));
        }

        let seek = self.seek_offset(source);
        match self
            .tool
            .extract_clip(source, seek, self.preview_seconds, self.width, &dest)
        {
            Ok(()) if dest.exists() => Some(file_name(&dest)),
            Ok(()) => None,
            Err(e) => {
                debug!("Preview extraction failed for {}: {}", source.display(), e);
                remove_partial(&dest);
                None
            }
        }
    }

    /// Write the solid-color fallback thumbnail
    pub fn write_placeholder(&self, dest: &Path) -> Result<()> {
        let (width, height) = self.placeholder_size;
        let img = RgbImage::from_pixel(width, height, Rgb(self.placeholder_color));

        let file = File::create(dest).map_err(|e| ScanError::io(dest, e))?;
        let mut writer = BufWriter::new(file);
        JpegEncoder::new_with_quality(&mut writer, PLACEHOLDER_QUALITY)
            .encode_image(&img)
            .map_err(|e| ScanError::Tool(format!("Failed to encode placeholder: {}", e)))
    }
}

/// Remove whatever a failed transcode left at `dest`
fn remove_partial(dest: &Path) {
    match fs::remove_file(dest) {
        Ok(()) => debug!("Removed partial preview {}", dest.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => debug!("Could not remove partial preview {}: {}", dest.display(), e),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
