//! Job state and cooperative control
//!
//! A job is one scan over one folder. Its progress lives in a [`JobState`]
//! behind a read-write lock: the pipeline thread is the only writer and any
//! number of observers take [`JobSnapshot`]s. Pause and stop requests travel
//! through a separate [`JobControl`] so that a paused pipeline can sleep on a
//! condition variable without holding the state lock.

use crate::core::error::ScanError;
use crate::core::system::SystemStats;
use crate::duplicate::FileRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, PoisonError, RwLock};
use std::thread::JoinHandle;

// =============================================================================
// Stages
// =============================================================================

/// Pipeline position of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Created, worker not yet past discovery
    #[default]
    Waiting,
    /// Stage 1: cleaning up file names
    Renaming,
    /// Stage 2: preview clips tagged by file stem
    ExtractingPreviews,
    /// Stage 3: thumbnails tagged by file stem
    CollectingThumbnails,
    /// Stage 4: snapshotting the file list
    LoadingFiles,
    /// Stage 5: content hashing and duplicate grouping
    Hashing,
    /// Stage 6: finished normally
    Complete,
    /// Stop was requested; the pipeline exited early
    Stopped,
    /// A fatal error ended the job
    Failed,
}

impl Stage {
    /// Human-readable label shown to observers
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Waiting => "Waiting…",
            Stage::Renaming => "(STAGE 1/6) Pre-hash: Renaming Files",
            Stage::ExtractingPreviews => "(STAGE 2/6) Pre-hash: Extracting Previews",
            Stage::CollectingThumbnails => "(STAGE 3/6) Pre-hash: Collecting Thumbnails",
            Stage::LoadingFiles => "(STAGE 4/6) Loading files…",
            Stage::Hashing => "(STAGE 5/6) Hashing…",
            Stage::Complete => "(STAGE 6/6) Hashing Complete",
            Stage::Stopped => "Scan Stopped",
            Stage::Failed => "Scan Failed",
        }
    }

    /// 1-based stage number for the six pipeline stages
    pub fn number(&self) -> Option<u8> {
        match self {
            Stage::Renaming => Some(1),
            Stage::ExtractingPreviews => Some(2),
            Stage::CollectingThumbnails => Some(3),
            Stage::LoadingFiles => Some(4),
            Stage::Hashing => Some(5),
            Stage::Complete => Some(6),
            Stage::Waiting | Stage::Stopped | Stage::Failed => None,
        }
    }

    /// Whether the pipeline has exited
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Complete | Stage::Stopped | Stage::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// Control
// =============================================================================

/// Commands accepted from the request layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobCommand {
    Pause,
    Resume,
    Stop,
}

impl FromStr for JobCommand {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pause" => Ok(JobCommand::Pause),
            "resume" => Ok(JobCommand::Resume),
            "stop" => Ok(JobCommand::Stop),
            other => Err(ScanError::UnknownCommand(other.to_string())),
        }
    }
}

/// Pause gate and stop flag shared between a job's pipeline and its controllers
///
/// Stop is permanent. Stopping also opens the pause gate so a paused worker
/// wakes up, notices the stop and exits.
#[derive(Debug, Default)]
pub struct JobControl {
    stop: AtomicBool,
    paused: Mutex<bool>,
    gate: Condvar,
}

impl JobControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Close the gate; the worker blocks at its next suspension point
    pub fn pause(&self) {
        *self.paused.lock().unwrap_or_else(PoisonError::into_inner) = true;
    }

    /// Open the gate and wake the worker
    pub fn resume(&self) {
        *self.paused.lock().unwrap_or_else(PoisonError::into_inner) = false;
        self.gate.notify_all();
    }

    /// Request a stop and force the gate open
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        *self.paused.lock().unwrap_or_else(PoisonError::into_inner) = false;
        self.gate.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block while the gate is closed. Returns immediately once stopped.
    pub fn wait_if_paused(&self) {
        let mut paused = self.paused.lock().unwrap_or_else(PoisonError::into_inner);
        while *paused && !self.is_stopped() {
            paused = self
                .gate
                .wait(paused)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Suspension point before a unit of work.
    ///
    /// Returns `false` when the job is stopped and the caller must bail out.
    pub fn checkpoint(&self) -> bool {
        if self.is_stopped() {
            return false;
        }
        self.wait_if_paused();
        !self.is_stopped()
    }

    pub(crate) fn apply(&self, command: JobCommand) {
        match command {
            JobCommand::Pause => self.pause(),
            JobCommand::Resume => self.resume(),
            JobCommand::Stop => self.stop(),
        }
    }
}

// =============================================================================
// State
// =============================================================================

/// A file still waiting to be hashed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemainingFile {
    pub name: String,
    pub size: u64,
}

/// Mutable progress of one job
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobState {
    pub job_id: String,
    pub scanned_folder: PathBuf,
    pub verify_after: bool,
    pub stage: Stage,
    pub stage_label: String,
    /// Files handled in the current stage
    pub progress: usize,
    pub total: usize,
    pub bytes_scanned: u64,
    pub bytes_total: u64,
    /// Hashing throughput in MiB/s
    pub speed: u64,
    /// Seconds left in the hashing stage
    pub eta: u64,
    /// Percent of the current file hashed (0-100)
    pub file_pct: f64,
    pub current_file: Option<PathBuf>,
    pub current_size: u64,
    pub duplicate_bytes: u64,
    pub dup_groups: usize,
    pub largest_group: usize,
    /// Most recent thumbnail file name
    pub thumbnail: Option<String>,
    pub scanned_names: Vec<String>,
    pub remaining: Vec<RemainingFile>,
    /// Digest -> records, only for groups larger than one
    pub duplicates: BTreeMap<String, Vec<FileRecord>>,
    pub json_path: Option<PathBuf>,
    /// Files whose digest was computed by reading them
    pub files_hashed: usize,
    /// Files whose digest came from the content cache
    pub cache_hits: usize,
    /// Host CPU usage in percent at the last per-file update
    pub cpu: f32,
    /// Host memory in use, percent
    pub mem: f32,
    /// GiB free on the scanned folder's disk
    pub free: f64,
    pub done: bool,
    pub error: Option<String>,
}

impl JobState {
    pub fn new(job_id: &str, folder: PathBuf, verify_after: bool) -> Self {
        let mut state = Self {
            job_id: job_id.to_string(),
            scanned_folder: folder,
            verify_after,
            largest_group: 1,
            ..Default::default()
        };
        state.set_stage(Stage::Waiting);
        state
    }

    /// Record a reading of the host gauges
    pub fn set_system(&mut self, stats: SystemStats) {
        self.cpu = stats.cpu;
        self.mem = stats.mem;
        self.free = stats.free;
    }

    /// Move to a new stage and refresh the display label
    pub fn set_stage(&mut self, stage: Stage) {
        self.stage = stage;
        self.stage_label = stage.label().to_string();
    }
}

/// Serializable copy of a job, with the control flags flattened to booleans
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    #[serde(flatten)]
    pub state: JobState,
    pub paused: bool,
    pub stop: bool,
}

impl JobSnapshot {
    /// The pipeline has exited, successfully or not
    pub fn is_finished(&self) -> bool {
        self.state.stage.is_terminal()
    }
}

// =============================================================================
// Handle
// =============================================================================

/// Registry entry for one job
#[derive(Debug)]
pub struct JobHandle {
    id: String,
    state: RwLock<JobState>,
    control: JobControl,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl JobHandle {
    pub fn new(id: &str, folder: PathBuf, verify_after: bool) -> Self {
        Self {
            id: id.to_string(),
            state: RwLock::new(JobState::new(id, folder, verify_after)),
            control: JobControl::new(),
            worker: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn control(&self) -> &JobControl {
        &self.control
    }

    /// Apply one atomic mutation to the job state
    pub(crate) fn update<F: FnOnce(&mut JobState)>(&self, f: F) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut state);
    }

    /// Read from the job state without cloning all of it
    pub fn read<R, F: FnOnce(&JobState) -> R>(&self, f: F) -> R {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            state: self.read(JobState::clone),
            paused: self.control.is_paused(),
            stop: self.control.is_stopped(),
        }
    }

    pub(crate) fn attach_worker(&self, handle: JoinHandle<()>) {
        *self.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    /// Wait for the worker thread to exit
    pub fn join(&self) -> crate::core::error::Result<()> {
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle
                .join()
                .map_err(|_| ScanError::Thread(format!("worker for job {} panicked", self.id)))?;
        }
        Ok(())
    }
}
