//! Error types for the video dedupe tool
//!
//! This module defines the error types used throughout the scanner. Errors
//! raised inside a running job are recorded on the job itself; errors raised
//! at the registry boundary are returned to the caller.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the video dedupe tool
#[derive(Error, Debug)]
pub enum ScanError {
    /// The folder handed to a new job does not exist or is not a directory
    #[error("Folder not found: {}", .0.display())]
    FolderNotFound(PathBuf),

    /// No job is registered under the given identifier
    #[error("Unknown job: {0}")]
    UnknownJob(String),

    /// A control command other than pause/resume/stop
    #[error("Unknown job command '{0}' (expected pause, resume or stop)")]
    UnknownCommand(String),

    /// I/O failure tied to a specific path
    #[error("IO error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The content cache could not be read or written
    #[error("Cache error: {0}")]
    Cache(String),

    /// The job report could not be serialized or written
    #[error("Report error: {0}")]
    Report(String),

    /// The rename marker pattern failed to compile
    #[error("Invalid marker pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// An external media tool failed or could not be launched
    #[error("Media tool failed: {0}")]
    Tool(String),

    /// The worker thread could not be spawned or panicked
    #[error("Worker thread error: {0}")]
    Thread(String),
}

impl ScanError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ScanError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ScanError>;
