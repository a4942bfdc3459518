//! Process-wide job table
//!
//! Each job gets its own worker thread running the pipeline. Jobs are never
//! removed; the table lives as long as the registry.

use crate::core::config::ScanSettings;
use crate::core::error::{Result, ScanError};
use crate::core::job::{JobCommand, JobHandle, JobSnapshot, Stage};
use crate::core::pipeline::run_job;
use crate::duplicate::FileRecord;
use crate::media::{DerivativeGenerator, MediaTool};
use log::{debug, info};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::thread;
use uuid::Uuid;

/// Owns every job and the shared scan resources
pub struct JobRegistry {
    settings: Arc<ScanSettings>,
    derivatives: Arc<DerivativeGenerator>,
    jobs: RwLock<HashMap<String, Arc<JobHandle>>>,
}

impl JobRegistry {
    /// Create the registry and its output directories
    pub fn new(settings: ScanSettings, tool: Arc<dyn MediaTool>) -> Result<Self> {
        fs::create_dir_all(&settings.root_dir).map_err(|e| ScanError::io(&settings.root_dir, e))?;
        let derivatives = DerivativeGenerator::new(tool, &settings);
        derivatives.ensure_dirs()?;

        Ok(Self {
            settings: Arc::new(settings),
            derivatives: Arc::new(derivatives),
            jobs: RwLock::new(HashMap::new()),
        })
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    /// Register a job for `folder` and start its worker. Returns the job id.
    pub fn create(&self, folder: impl AsRef<Path>, verify_after: bool) -> Result<String> {
        let folder = resolve_folder(folder.as_ref())?;
        let id = Uuid::new_v4().to_string();
        let job = Arc::new(JobHandle::new(&id, folder, verify_after));

        self.jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), Arc::clone(&job));

        let worker_job = Arc::clone(&job);
        let settings = Arc::clone(&self.settings);
        let derivatives = Arc::clone(&self.derivatives);
        let spawned = thread::Builder::new()
            .name(format!("scan-{}", &id[..8]))
            .spawn(move || run_job(&worker_job, &settings, &derivatives));

        match spawned {
            Ok(handle) => {
                job.attach_worker(handle);
                info!("Created job {}", id);
                Ok(id)
            }
            Err(e) => {
                let message = format!("failed to start worker for job {}: {}", id, e);
                job.update(|s| {
                    s.set_stage(Stage::Failed);
                    s.error = Some(message.clone());
                });
                Err(ScanError::Thread(message))
            }
        }
    }

    /// Start a new job over the same folder and flag as `id`
    pub fn rescan(&self, id: &str) -> Result<String> {
        let (folder, verify_after) =
            self.job(id)?.read(|s| (s.scanned_folder.clone(), s.verify_after));
        debug!("Rescanning {} from job {}", folder.display(), id);
        self.create(folder, verify_after)
    }

    pub fn job(&self, id: &str) -> Result<Arc<JobHandle>> {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| ScanError::UnknownJob(id.to_string()))
    }

    pub fn snapshot(&self, id: &str) -> Result<JobSnapshot> {
        Ok(self.job(id)?.snapshot())
    }

    pub fn pause(&self, id: &str) -> Result<()> {
        self.control(id, JobCommand::Pause)
    }

    pub fn resume(&self, id: &str) -> Result<()> {
        self.control(id, JobCommand::Resume)
    }

    pub fn stop(&self, id: &str) -> Result<()> {
        self.control(id, JobCommand::Stop)
    }

    pub fn control(&self, id: &str, command: JobCommand) -> Result<()> {
        let job = self.job(id)?;
        debug!("Job {}: {:?}", id, command);
        job.control().apply(command);
        Ok(())
    }

    /// Group sharing `digest` in any job's duplicate map
    pub fn find_duplicates(&self, digest: &str) -> Option<Vec<FileRecord>> {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        jobs.values()
            .find_map(|job| job.read(|s| s.duplicates.get(digest).cloned()))
    }

    pub fn job_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self
            .jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Block until the job's worker exits and return its final snapshot
    pub fn wait(&self, id: &str) -> Result<JobSnapshot> {
        let job = self.job(id)?;
        job.join()?;
        Ok(job.snapshot())
    }
}

fn resolve_folder(folder: &Path) -> Result<PathBuf> {
    if !folder.is_dir() {
        return Err(ScanError::FolderNotFound(folder.to_path_buf()));
    }
    fs::canonicalize(folder).map_err(|e| ScanError::io(folder, e))
}
