//! Six-stage scan pipeline
//!
//! Runs on the job's worker thread and is the only writer of its state.
//! Every stage visits files in walk order and passes the job's control
//! checkpoint before each file, so a paused job makes no progress and a
//! stopped job exits at the next file (or the next chunk while hashing).

use crate::core::config::ScanSettings;
use crate::core::error::{Result, ScanError};
use crate::core::job::{JobHandle, RemainingFile, Stage};
use crate::core::report::ScanReport;
use crate::core::system::SystemMonitor;
use crate::duplicate::{
    hash_file, modified_secs, CacheEntry, ContentCache, DuplicateAccumulator, FileRecord,
};
use crate::media::DerivativeGenerator;
use log::{debug, error, info, trace, warn};
use rayon::prelude::*;
use regex::{Regex, RegexBuilder};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use walkdir::WalkDir;

const MIB: f64 = 1024.0 * 1024.0;

/// How a pipeline run ended, short of an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Finished,
    Stopped,
}

/// Drive one job through every stage and record how it ended
pub(crate) fn run_job(job: &JobHandle, settings: &ScanSettings, derivatives: &DerivativeGenerator) {
    let folder = job.read(|s| s.scanned_folder.clone());
    info!("Job {} scanning {}", job.id(), folder.display());

    let outcome =
        Pipeline::new(job, settings, derivatives, &folder).and_then(|p| p.execute(&folder));

    match outcome {
        Ok(Flow::Finished) => {
            job.update(|s| {
                s.set_stage(Stage::Complete);
                s.done = true;
                s.speed = 0;
                s.eta = 0;
                s.file_pct = 100.0;
            });
            info!("Job {} complete", job.id());
        }
        Ok(Flow::Stopped) => {
            job.update(|s| {
                s.set_stage(Stage::Stopped);
                s.speed = 0;
                s.eta = 0;
            });
            info!("Job {} stopped", job.id());
        }
        Err(e) => {
            error!("Job {} failed: {}", job.id(), e);
            job.update(|s| {
                s.set_stage(Stage::Failed);
                s.error = Some(e.to_string());
                s.speed = 0;
                s.eta = 0;
            });
        }
    }
}

struct Pipeline<'a> {
    job: &'a JobHandle,
    settings: &'a ScanSettings,
    derivatives: &'a DerivativeGenerator,
    marker: Regex,
    system: SystemMonitor,
}

impl<'a> Pipeline<'a> {
    fn new(
        job: &'a JobHandle,
        settings: &'a ScanSettings,
        derivatives: &'a DerivativeGenerator,
        folder: &Path,
    ) -> Result<Self> {
        let marker = RegexBuilder::new(&settings.marker_pattern)
            .case_insensitive(true)
            .build()?;
        Ok(Self {
            job,
            settings,
            derivatives,
            marker,
            system: SystemMonitor::new(folder),
        })
    }

    fn stopped(&self) -> bool {
        !self.job.control().checkpoint()
    }

    fn execute(&self, folder: &Path) -> Result<Flow> {
        let files = discover_videos(folder, self.settings);
        let bytes_total = total_size(&files);
        debug!(
            "Found {} videos ({} bytes) under {}",
            files.len(),
            bytes_total,
            folder.display()
        );
        self.job.update(|s| {
            s.total = files.len();
            s.bytes_total = bytes_total;
            s.bytes_scanned = 0;
        });

        let Some(files) = self.rename_stage(files) else {
            return Ok(Flow::Stopped);
        };
        if self.preview_stage(&files) == Flow::Stopped {
            return Ok(Flow::Stopped);
        }
        if self.thumbnail_stage(&files) == Flow::Stopped {
            return Ok(Flow::Stopped);
        }
        let remaining = self.load_stage(&files)?;
        self.hash_stage(folder, &files, remaining, bytes_total)
    }

    fn enter(&self, stage: Stage) {
        info!("Job {}: {}", self.job.id(), stage.label());
        self.job.update(|s| {
            s.set_stage(stage);
            s.progress = 0;
        });
    }

    fn mark_visited(&self, index: usize, path: &Path) {
        let stats = self.system.sample();
        self.job.update(|s| {
            s.set_system(stats);
            s.progress = index + 1;
            s.current_file = Some(path.to_path_buf());
            s.file_pct = 100.0;
        });
    }

    /// Stage 1. Returns the post-rename paths, or `None` when stopped.
    fn rename_stage(&self, files: Vec<PathBuf>) -> Option<Vec<PathBuf>> {
        self.enter(Stage::Renaming);
        let pace = rename_delay(
            files.len(),
            self.settings.rename_min_duration,
            self.settings.rename_min_per_file,
        );

        let mut renamed = Vec::with_capacity(files.len());
        for (i, path) in files.into_iter().enumerate() {
            if self.stopped() {
                return None;
            }
            let path = normalize_file_name(&path, &self.marker);
            self.mark_visited(i, &path);
            renamed.push(path);

            if !pace.is_zero() {
                thread::sleep(pace);
            }
        }
        Some(renamed)
    }

    /// Stage 2
    fn preview_stage(&self, files: &[PathBuf]) -> Flow {
        self.enter(Stage::ExtractingPreviews);
        for (i, path) in files.iter().enumerate() {
            if self.stopped() {
                return Flow::Stopped;
            }
            if self.derivatives.preview(path, &file_stem(path)).is_none() {
                trace!("No preview for {}", path.display());
            }
            self.mark_visited(i, path);
        }
        Flow::Finished
    }

    /// Stage 3
    fn thumbnail_stage(&self, files: &[PathBuf]) -> Flow {
        self.enter(Stage::CollectingThumbnails);
        for (i, path) in files.iter().enumerate() {
            if self.stopped() {
                return Flow::Stopped;
            }
            let thumb = self.derivatives.thumbnail(path, &file_stem(path));
            self.mark_visited(i, path);
            self.job.update(|s| s.thumbnail = Some(thumb));
        }
        Flow::Finished
    }

    /// Stage 4
    fn load_stage(&self, files: &[PathBuf]) -> Result<Vec<RemainingFile>> {
        let remaining = files
            .iter()
            .map(|path| {
                let meta = fs::metadata(path).map_err(|e| ScanError::io(path, e))?;
                Ok(RemainingFile {
                    name: file_name(path),
                    size: meta.len(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        info!("Job {}: {}", self.job.id(), Stage::LoadingFiles.label());
        self.job.update(|s| {
            s.set_stage(Stage::LoadingFiles);
            s.remaining = remaining.clone();
            s.scanned_names.clear();
            s.progress = 0;
            s.file_pct = 0.0;
        });

        if !self.settings.load_delay.is_zero() {
            thread::sleep(self.settings.load_delay);
        }
        Ok(remaining)
    }

    /// Stage 5. The content cache lives only for this stage and is flushed
    /// however the stage ends.
    fn hash_stage(
        &self,
        folder: &Path,
        files: &[PathBuf],
        remaining: Vec<RemainingFile>,
        bytes_total: u64,
    ) -> Result<Flow> {
        let mut cache = ContentCache::load(&self.settings.cache_file);
        let result = self.hash_files(folder, files, remaining, bytes_total, &mut cache);
        if let Err(e) = cache.save() {
            warn!("Job {}: {}", self.job.id(), e);
        }
        result
    }

    fn hash_files(
        &self,
        folder: &Path,
        files: &[PathBuf],
        remaining: Vec<RemainingFile>,
        bytes_total: u64,
        cache: &mut ContentCache,
    ) -> Result<Flow> {
        let control = self.job.control();
        let report_path = self.settings.report_path(self.job.id());
        let total = files.len();

        info!("Job {}: {}", self.job.id(), Stage::Hashing.label());
        self.job.update(|s| {
            s.set_stage(Stage::Hashing);
            s.progress = 0;
            s.bytes_scanned = 0;
            s.json_path = Some(report_path.clone());
        });

        let mut accumulator = DuplicateAccumulator::new();
        let mut report = ScanReport::new(folder, Vec::new(), Default::default(), 0, total, 0);
        let mut scanned = 0u64;
        let started = Instant::now();

        for (i, path) in files.iter().enumerate() {
            if !control.checkpoint() {
                return Ok(Flow::Stopped);
            }

            let meta = fs::metadata(path).map_err(|e| ScanError::io(path, e))?;
            let size = meta.len();
            let mtime = modified_secs(&meta);
            self.job.update(|s| {
                s.current_file = Some(path.clone());
                s.current_size = size;
                s.file_pct = 0.0;
                s.progress = i + 1;
            });

            let cached = cache.lookup(path, size, mtime).map(str::to_string);
            let from_cache = cached.is_some();
            let digest = match cached {
                Some(digest) => digest,
                None => {
                    let hashed = hash_file(path, self.settings.chunk_size, control, |pct| {
                        self.job.update(|s| s.file_pct = pct)
                    })?;
                    match hashed {
                        Some(digest) => digest,
                        None => return Ok(Flow::Stopped),
                    }
                }
            };
            debug!(
                "{} {} ({})",
                if from_cache { "cached" } else { "hashed" },
                path.display(),
                digest
            );
            cache.insert(
                path,
                CacheEntry {
                    hash: digest.clone(),
                    size,
                    mtime,
                },
            );

            let thumbnail = self.derivatives.thumbnail(path, &digest);
            let preview = self.derivatives.preview(path, &digest);
            let record = FileRecord {
                path: path.clone(),
                name: file_name(path),
                digest,
                size,
                thumbnail: thumbnail.clone(),
                preview,
            };

            report.videos.push(record.clone());
            let stats = accumulator.add(record);
            let duplicates = accumulator.duplicate_groups();
            scanned += size;

            let speed = throughput_mib(scanned, started.elapsed());
            let eta = eta_secs(bytes_total, scanned, speed);
            let system = self.system.sample();

            self.job.update(|s| {
                s.set_system(system);
                s.bytes_scanned = scanned;
                s.speed = speed;
                s.eta = eta;
                s.file_pct = 0.0;
                s.duplicate_bytes = stats.duplicate_bytes;
                s.dup_groups = stats.dup_groups;
                s.largest_group = stats.largest_group;
                s.thumbnail = Some(thumbnail);
                s.scanned_names.push(file_name(path));
                s.remaining = remaining.get(i + 1..).unwrap_or_default().to_vec();
                s.duplicates = duplicates.clone();
                if from_cache {
                    s.cache_hits += 1;
                } else {
                    s.files_hashed += 1;
                }
            });

            report.duplicates = duplicates;
            report.progress = format!("{}/{}", i + 1, total);
            report.dup_bytes = stats.duplicate_bytes;
            report.touch();
            report.write_to(&report_path)?;
        }

        if files.is_empty() {
            report.write_to(&report_path)?;
        }
        Ok(Flow::Finished)
    }
}

/// Every file under `folder` with a configured video extension, in walk order
pub fn discover_videos(folder: &Path, settings: &ScanSettings) -> Vec<PathBuf> {
    WalkDir::new(folder)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| settings.is_video(path))
        .collect()
}

fn total_size(files: &[PathBuf]) -> u64 {
    files
        .par_iter()
        .map(|path| fs::metadata(path).map(|m| m.len()).unwrap_or(0))
        .sum()
}

/// File name with the marker removed and dashes turned into spaces
pub fn clean_name(name: &str, marker: &Regex) -> String {
    marker
        .replace_all(&name.replace('-', " "), "")
        .trim()
        .to_string()
}

/// Rename `path` to its cleaned name. Any failure, or an existing file at the
/// target, leaves it where it is.
fn normalize_file_name(path: &Path, marker: &Regex) -> PathBuf {
    let name = file_name(path);
    let cleaned = clean_name(&name, marker);
    if cleaned.is_empty() || cleaned == name {
        return path.to_path_buf();
    }

    let target = path.with_file_name(&cleaned);
    if target.exists() {
        warn!(
            "Not renaming {}: {} already exists",
            path.display(),
            target.display()
        );
        return path.to_path_buf();
    }

    match fs::rename(path, &target) {
        Ok(()) => {
            debug!("Renamed {} -> {}", name, cleaned);
            target
        }
        Err(e) => {
            warn!("Failed to rename {}: {}", path.display(), e);
            path.to_path_buf()
        }
    }
}

/// Per-file pause that stretches the rename stage to at least `min_total`
fn rename_delay(count: usize, min_total: Duration, min_per_file: Duration) -> Duration {
    let count = u32::try_from(count.max(1)).unwrap_or(u32::MAX);
    (min_total / count).max(min_per_file)
}

/// Whole MiB per second, with elapsed time floored to one second
fn throughput_mib(scanned: u64, elapsed: Duration) -> u64 {
    (scanned as f64 / elapsed.as_secs_f64().max(1.0) / MIB) as u64
}

/// Seconds left at `speed` MiB/s, with speed floored to one
fn eta_secs(bytes_total: u64, scanned: u64, speed: u64) -> u64 {
    (bytes_total.saturating_sub(scanned) as f64 / MIB / speed.max(1) as f64) as u64
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
