//! Video Dedupe Tool Library
//!
//! Scans a folder tree of videos, normalizes their file names, generates
//! thumbnails and short preview clips, and finds byte-identical duplicates by
//! SHA256 digest. Scans run as background jobs that can be paused, resumed
//! and stopped while observers poll a progress snapshot.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - [`core`] - Configuration, errors, the job model, the six-stage pipeline,
//!   the job registry and the per-job report
//! - [`duplicate`] - Streaming hashing, the digest cache and duplicate grouping
//! - [`media`] - Thumbnail and preview generation through ffmpeg
//! - [`cli`] - Command-line interface (only used by the binary)
//! - [`testdb`] - Mock transcoder and video fixtures for testing
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use video_dedupe_tool::core::config::Config;
//! use video_dedupe_tool::core::JobRegistry;
//! use video_dedupe_tool::media::FfmpegTool;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load_default()?;
//!     let tool = Arc::new(FfmpegTool::from_config(&config.media));
//!     let registry = JobRegistry::new(config.scan_settings(), tool)?;
//!
//!     let id = registry.create("/path/to/videos", false)?;
//!     registry.pause(&id)?;
//!     println!("{}", registry.snapshot(&id)?.state.stage_label);
//!     registry.resume(&id)?;
//!
//!     let done = registry.wait(&id)?;
//!     println!(
//!         "{} duplicate groups, {} bytes",
//!         done.state.dup_groups, done.state.duplicate_bytes
//!     );
//!     Ok(())
//! }
//! ```
//!
//! # Stages
//!
//! 1. Rename files, stripping the quality marker from their names
//! 2. Extract preview clips tagged by file stem
//! 3. Extract thumbnails tagged by file stem
//! 4. Snapshot the file list
//! 5. Hash (reusing cached digests), regenerate derivatives by digest, group
//!    duplicates and rewrite the report after every file
//! 6. Mark the job complete

pub mod cli;
pub mod core;
pub mod duplicate;
pub mod media;
pub mod testdb;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
