//! Host load gauges for progress snapshots
//!
//! Every per-file progress update carries the global CPU usage, the share of
//! memory in use and the free space (GiB, one decimal) on the disk holding
//! the scanned folder. Sampling is throttled so a fast stage does not query
//! the OS once per file.

use log::trace;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use sysinfo::{Disks, System};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Minimum time between two real samples
const SAMPLE_INTERVAL: Duration = Duration::from_millis(500);

/// One reading of the host gauges
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SystemStats {
    /// Global CPU usage in percent
    pub cpu: f32,
    /// Memory in use, percent of total
    pub mem: f32,
    /// Free space on the scanned folder's disk, in GiB rounded to 0.1
    pub free: f64,
}

struct Sampler {
    system: System,
    last: Option<(Instant, SystemStats)>,
}

/// Throttled sampler bound to one scan folder
pub struct SystemMonitor {
    base: PathBuf,
    sampler: Mutex<Sampler>,
}

impl SystemMonitor {
    pub fn new(base: &Path) -> Self {
        let mut system = System::new();
        // CPU usage is a delta between refreshes, so prime the first one
        system.refresh_cpu_usage();
        Self {
            base: base.to_path_buf(),
            sampler: Mutex::new(Sampler { system, last: None }),
        }
    }

    /// Current gauges, or the previous reading if it is still fresh
    pub fn sample(&self) -> SystemStats {
        let mut sampler = self.sampler.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((at, stats)) = sampler.last {
            if at.elapsed() < SAMPLE_INTERVAL {
                return stats;
            }
        }

        sampler.system.refresh_cpu_usage();
        sampler.system.refresh_memory();
        let stats = SystemStats {
            cpu: sampler.system.global_cpu_usage(),
            mem: memory_percent(
                sampler.system.used_memory(),
                sampler.system.total_memory(),
            ),
            free: free_space_gib(&self.base),
        };
        trace!("System stats: {:?}", stats);
        sampler.last = Some((Instant::now(), stats));
        stats
    }
}

fn memory_percent(used: u64, total: u64) -> f32 {
    if total == 0 {
        return 0.0;
    }
    (used as f64 / total as f64 * 100.0) as f32
}

/// Free space of the mounted disk with the longest mount point containing `base`
fn free_space_gib(base: &Path) -> f64 {
    let disks = Disks::new_with_refreshed_list();
    let mounts: Vec<(&Path, u64)> = disks
        .list()
        .iter()
        .map(|disk| (disk.mount_point(), disk.available_space()))
        .collect();
    containing_mount(base, &mounts)
        .map(round_gib)
        .unwrap_or(0.0)
}

fn containing_mount(base: &Path, mounts: &[(&Path, u64)]) -> Option<u64> {
    mounts
        .iter()
        .filter(|(mount, _)| base.starts_with(mount))
        .max_by_key(|(mount, _)| mount.components().count())
        .map(|(_, free)| *free)
}

fn round_gib(bytes: u64) -> f64 {
    (bytes as f64 / GIB * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_gib() {
        assert_eq!(round_gib(0), 0.0);
        assert_eq!(round_gib(1024 * 1024 * 1024), 1.0);
        assert_eq!(round_gib(3 * 1024 * 1024 * 1024 / 2), 1.5);
        assert_eq!(round_gib(1024 * 1024 * 1024 + 1024 * 1024), 1.0);
    }

    #[test]
    fn test_memory_percent() {
        assert_eq!(memory_percent(0, 0), 0.0);
        assert_eq!(memory_percent(1, 4), 25.0);
        assert_eq!(memory_percent(4, 4), 100.0);
    }

    #[test]
    fn test_containing_mount_prefers_deepest() {
        let mounts = [
            (Path::new("/"), 10),
            (Path::new("/home"), 20),
            (Path::new("/home/user/media"), 30),
        ];
        assert_eq!(containing_mount(Path::new("/home/user/media/videos"), &mounts), Some(30));
        assert_eq!(containing_mount(Path::new("/home/other"), &mounts), Some(20));
        assert_eq!(containing_mount(Path::new("/var/tmp"), &mounts), Some(10));
        assert_eq!(containing_mount(Path::new("/homework"), &mounts[1..]), None);
    }

    #[test]
    fn test_sample_is_in_range_and_throttled() {
        let monitor = SystemMonitor::new(&std::env::temp_dir());
        let first = monitor.sample();
        assert!(first.cpu >= 0.0);
        assert!((0.0..=100.0).contains(&first.mem));
        assert!(first.free >= 0.0);

        assert_eq!(monitor.sample(), first);
    }
}
