//! Mock transcoder
//!
//! Stands in for ffmpeg in tests. Successful calls write a small marker file
//! at the destination; every call is counted so tests can assert whether the
//! tool was invoked at all.

use crate::core::error::{Result, ScanError};
use crate::media::MediaTool;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

/// Configurable fake [`MediaTool`]
#[derive(Debug, Default)]
pub struct MockMediaTool {
    duration: Option<f64>,
    fail: bool,
    delay: Duration,
    probe_calls: AtomicUsize,
    frame_calls: AtomicUsize,
    clip_calls: AtomicUsize,
}

impl MockMediaTool {
    /// Tool that succeeds but cannot report a duration
    pub fn new() -> Self {
        Self::default()
    }

    /// Tool whose every call fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn with_duration(duration: f64) -> Self {
        Self {
            duration: Some(duration),
            ..Self::default()
        }
    }

    /// Sleep this long inside every extraction call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    pub fn frame_calls(&self) -> usize {
        self.frame_calls.load(Ordering::SeqCst)
    }

    pub fn clip_calls(&self) -> usize {
        self.clip_calls.load(Ordering::SeqCst)
    }

    fn produce(&self, source: &Path, dest: &Path, marker: &[u8]) -> Result<()> {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        if self.fail {
            return Err(ScanError::Tool(format!(
                "mock failure for {}",
                source.display()
            )));
        }
        fs::write(dest, marker).map_err(|e| ScanError::io(dest, e))
    }
}

impl MediaTool for MockMediaTool {
    fn probe_duration(&self, _source: &Path) -> Option<f64> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            None
        } else {
            self.duration
        }
    }

    fn extract_frame(&self, source: &Path, _seek_secs: f64, _width: u32, dest: &Path) -> Result<()> {
        self.frame_calls.fetch_add(1, Ordering::SeqCst);
        self.produce(source, dest, b"mock-frame")
    }

    fn extract_clip(
        &self,
        source: &Path,
        _seek_secs: f64,
        _seconds: u32,
        _width: u32,
        dest: &Path,
    ) -> Result<()> {
        self.clip_calls.fetch_add(1, Ordering::SeqCst);
        self.produce(source, dest, b"mock-clip")
    }
}
