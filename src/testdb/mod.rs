//! Test Database Module
//!
//! Everything needed to exercise the scanner without ffmpeg installed and
//! without real footage.
//!
//! # Features
//!
//! - **Mock Transcoder**: [`MockMediaTool`] counts invocations and can be told
//!   to fail or to run slowly
//! - **Video Fixtures**: [`VideoFixture`] writes folders of deterministic fake
//!   videos, including byte-identical copies
//! - **Integration Tests**: full registry-driven scans covering renames,
//!   duplicate accounting, the content cache, pause/resume and stop
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use video_dedupe_tool::core::config::ScanSettings;
//! use video_dedupe_tool::core::JobRegistry;
//! use video_dedupe_tool::testdb::{MockMediaTool, VideoFixture, MIB};
//!
//! let fixture = VideoFixture::new("/tmp/videos");
//! fixture.video("a.mp4", 2 * MIB, 1);
//! fixture.copy("a.mp4", "b.mp4");
//!
//! let registry = JobRegistry::new(
//!     ScanSettings::unpaced("/tmp/hashed"),
//!     Arc::new(MockMediaTool::new()),
//! ).unwrap();
//! let id = registry.create(fixture.root(), false).unwrap();
//! let snapshot = registry.wait(&id).unwrap();
//! assert_eq!(snapshot.state.dup_groups, 1);
//! ```

pub mod fixtures;
pub mod mock_media;

#[cfg(test)]
mod integration;

pub use fixtures::{generate_video_content, VideoFixture, KIB, MIB};
pub use mock_media::MockMediaTool;
