//! Core functionality module
//!
//! This module contains the scan engine: configuration, error handling, the
//! job model, the pipeline that drives a job and the registry that owns jobs.
//!
//! # Submodules
//!
//! - `config` - Configuration loading, saving, and management
//! - `error` - Error types and result aliases
//! - `job` - Stages, control gate, job state and snapshots
//! - `pipeline` - The six-stage scan
//! - `registry` - Job table and control entry points
//! - `report` - Per-job JSON report
//! - `system` - CPU, memory and free-disk gauges

pub mod config;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod registry;
pub mod report;
pub mod system;

pub use job::{JobCommand, JobSnapshot, JobState, Stage};
pub use registry::JobRegistry;
pub use report::ScanReport;
