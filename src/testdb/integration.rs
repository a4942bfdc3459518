//! End-to-end scans against real temp folders with a mock transcoder
//!
//! These tests drive the registry exactly as the CLI does and check the job
//! snapshot, the persisted report, the content cache and the derivative
//! directories after the worker exits.

use super::fixtures::{VideoFixture, KIB, MIB};
use super::mock_media::MockMediaTool;
use crate::core::config::ScanSettings;
use crate::core::job::{JobSnapshot, Stage};
use crate::core::registry::JobRegistry;
use crate::core::report::ScanReport;
use crate::duplicate::{compute_data_hash, hash_to_hex};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

struct Harness {
    _temp: TempDir,
    fixture: VideoFixture,
    tool: Arc<MockMediaTool>,
    registry: JobRegistry,
}

impl Harness {
    fn new() -> Self {
        Self::with_tool(MockMediaTool::new())
    }

    fn with_tool(tool: MockMediaTool) -> Self {
        Self::build(tool, 64 * 1024)
    }

    fn build(tool: MockMediaTool, chunk_size: usize) -> Self {
        let temp = TempDir::new().unwrap();
        let fixture = VideoFixture::new(temp.path().join("videos"));
        let mut settings = ScanSettings::unpaced(temp.path().join("hashed"));
        settings.chunk_size = chunk_size;
        let tool = Arc::new(tool);
        let registry = JobRegistry::new(settings, tool.clone()).unwrap();
        Self {
            _temp: temp,
            fixture,
            tool,
            registry,
        }
    }

    fn scan(&self) -> (String, JobSnapshot) {
        let id = self.registry.create(self.fixture.root(), false).unwrap();
        let snap = self.registry.wait(&id).unwrap();
        (id, snap)
    }

    fn report(&self, id: &str) -> ScanReport {
        ScanReport::load(&self.registry.settings().report_path(id)).unwrap()
    }

    /// Poll until `predicate` holds for the job, or panic after a few seconds
    fn wait_until<F: Fn(&JobSnapshot) -> bool>(&self, id: &str, predicate: F) -> JobSnapshot {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let snap = self.registry.snapshot(id).unwrap();
            if predicate(&snap) {
                return snap;
            }
            assert!(Instant::now() < deadline, "timed out in {:?}", snap.state.stage);
            thread::sleep(Duration::from_millis(2));
        }
    }
}

fn record_set(report: &ScanReport) -> Vec<(String, String, u64)> {
    let mut set: Vec<_> = report
        .videos
        .iter()
        .map(|v| (v.name.clone(), v.digest.clone(), v.size))
        .collect();
    set.sort();
    set
}

#[test]
fn test_marker_renames_and_duplicate_pair() {
    let h = Harness::new();
    h.fixture.video("clip_720m.mp4", 10 * MIB, 42);
    h.fixture.copy("clip_720m.mp4", "clip-720M.mp4");

    let (id, snap) = h.scan();
    let state = &snap.state;

    assert!(state.done);
    assert_eq!(state.stage, Stage::Complete);
    assert_eq!(state.stage_label, "(STAGE 6/6) Hashing Complete");
    assert!(state.error.is_none());
    assert!(h.fixture.root().join("clip.mp4").exists());
    assert!(h.fixture.root().join("clip .mp4").exists());
    assert!(!h.fixture.root().join("clip_720m.mp4").exists());

    assert_eq!(state.dup_groups, 1);
    assert_eq!(state.largest_group, 2);
    assert_eq!(state.duplicate_bytes, 20 * MIB as u64);
    assert_eq!(state.bytes_scanned, 20 * MIB as u64);
    assert_eq!((state.speed, state.eta), (0, 0));
    assert!(state.remaining.is_empty());
    assert!(state.mem > 0.0);

    let report = h.report(&id);
    assert_eq!(report.progress, "2/2");
    assert_eq!(report.dup_bytes, 20 * MIB as u64);
    assert_eq!(report.duplicates.len(), 1);
    let digest = &report.videos[0].digest;
    assert_eq!(&report.videos[1].digest, digest);
    assert_eq!(report.duplicates[digest].len(), 2);
}

#[test]
fn test_two_identical_and_one_unique() {
    let h = Harness::new();
    h.fixture.video("a.mp4", 2 * MIB, 1);
    h.fixture.copy("a.mp4", "sub/b.mkv");
    h.fixture.video("c.mov", 3 * MIB, 2);
    h.fixture.write("readme.txt", b"not a video");

    let (id, snap) = h.scan();

    assert_eq!(snap.state.total, 3);
    assert_eq!(snap.state.duplicate_bytes, 4 * MIB as u64);
    assert_eq!(snap.state.dup_groups, 1);
    assert_eq!(snap.state.largest_group, 2);
    assert_eq!(snap.state.files_hashed, 3);
    assert_eq!(snap.state.cache_hits, 0);

    let report = h.report(&id);
    assert_eq!(report.videos.len(), 3);
    assert_eq!(report.unique_videos().len(), 2);
    let digest = hash_to_hex(&compute_data_hash(&fs::read(h.fixture.root().join("c.mov")).unwrap()));
    assert!(report.videos.iter().any(|v| v.digest == digest));

    let group = h.registry.find_duplicates(report.duplicates.keys().next().unwrap());
    assert_eq!(group.map(|g| g.len()), Some(2));
}

#[test]
fn test_second_scan_uses_cache() {
    let h = Harness::new();
    h.fixture.video("a.mp4", MIB, 1);
    h.fixture.video("b.mp4", MIB, 2);

    let (first_id, first) = h.scan();
    assert_eq!(first.state.files_hashed, 2);
    assert!(h.registry.settings().cache_file.exists());

    let (second_id, second) = h.scan();
    assert_eq!(second.state.files_hashed, 0);
    assert_eq!(second.state.cache_hits, 2);
    assert_eq!(record_set(&h.report(&first_id)), record_set(&h.report(&second_id)));
}

#[test]
fn test_cache_recognises_every_unchanged_file() {
    let h = Harness::new();
    for i in 0..60 {
        h.fixture.video(&format!("v{:02}.mp4", i), 2 * KIB + i as usize, i);
    }

    let (_, first) = h.scan();
    assert_eq!(first.state.files_hashed, 60);

    let (_, second) = h.scan();
    assert_eq!(second.state.files_hashed, 0);
    assert_eq!(second.state.cache_hits, 60);
}

#[test]
fn test_changed_file_is_rehashed() {
    let h = Harness::new();
    h.fixture.video("a.mp4", MIB, 1);
    h.fixture.video("b.mp4", MIB, 2);
    h.scan();

    h.fixture.video("b.mp4", MIB + 10, 3);
    let (id, snap) = h.scan();

    assert_eq!(snap.state.files_hashed, 1);
    assert_eq!(snap.state.cache_hits, 1);
    let report = h.report(&id);
    let b = report.videos.iter().find(|v| v.name == "b.mp4").unwrap();
    assert_eq!(b.size, MIB as u64 + 10);
}

#[test]
fn test_derivatives_tagged_by_stem_then_digest() {
    let h = Harness::new();
    h.fixture.video("one.mp4", 100 * 1024, 1);
    h.fixture.copy("one.mp4", "two.mp4");

    let (id, _) = h.scan();
    let settings = h.registry.settings();
    let digest = h.report(&id).videos[0].digest.clone();

    for stem in ["one", "two", digest.as_str()] {
        assert!(settings.thumb_dir.join(format!("{}.jpg", stem)).exists());
        assert!(settings.preview_dir.join(format!("{}.mp4", stem)).exists());
    }

    // two stems plus one shared digest
    assert_eq!(h.tool.frame_calls(), 3);
    assert_eq!(h.tool.clip_calls(), 3);

    h.scan();
    assert_eq!(h.tool.frame_calls(), 3);
    assert_eq!(h.tool.clip_calls(), 3);
}

#[test]
fn test_failing_tool_degrades_gracefully() {
    let h = Harness::with_tool(MockMediaTool::failing());
    h.fixture.video("a.mp4", 10 * 1024, 1);

    let (id, snap) = h.scan();
    assert!(snap.state.done);

    let report = h.report(&id);
    let record = &report.videos[0];
    assert!(record.preview.is_none());
    assert_eq!(record.thumbnail, format!("{}.jpg", record.digest));
    assert!(h.registry.settings().thumb_dir.join(&record.thumbnail).exists());
}

#[test]
fn test_stop_inside_a_file() {
    let h = Harness::build(MockMediaTool::new(), 4 * KIB);
    h.fixture.video("first.mp4", 16 * MIB, 1);
    h.fixture.video("second.mp4", 16 * MIB, 2);

    let id = h.registry.create(h.fixture.root(), false).unwrap();
    let in_flight = h.wait_until(&id, |s| {
        s.state.stage == Stage::Hashing
            && s.state.scanned_names.len() == 1
            && s.state.file_pct > 0.0
            && s.state.file_pct < 50.0
    });
    h.registry.stop(&id).unwrap();
    let snap = h.registry.wait(&id).unwrap();

    let in_flight_name = in_flight
        .state
        .current_file
        .as_deref()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap();
    assert!(!in_flight.state.scanned_names.contains(&in_flight_name));

    assert_eq!(snap.state.stage, Stage::Stopped);
    assert!(!snap.state.done);
    assert!(snap.stop);
    assert_eq!(snap.state.scanned_names.len(), 1);
    assert!(!snap.state.scanned_names.contains(&in_flight_name));

    let report = h.report(&id);
    assert_eq!(report.videos.len(), 1);
    assert_eq!(report.progress, "1/2");
    assert!(report.videos.iter().all(|v| v.name != in_flight_name));
    let finished = &report.videos[0];
    let content = fs::read(&finished.path).unwrap();
    assert_eq!(finished.digest, hash_to_hex(&compute_data_hash(&content)));

    let cache = fs::read_to_string(&h.registry.settings().cache_file).unwrap();
    assert!(!cache.contains(&in_flight_name));
}

#[test]
fn test_unreadable_file_fails_the_job() {
    let h = Harness::with_tool(MockMediaTool::new().with_delay(Duration::from_millis(25)));
    for i in 0..4 {
        h.fixture.video(&format!("v{}.mp4", i), 64 * KIB, i);
    }

    let id = h.registry.create(h.fixture.root(), false).unwrap();
    let first = h.wait_until(&id, |s| {
        s.state.stage == Stage::Hashing
            && s.state.progress == 1
            && s.state.scanned_names.is_empty()
    });
    let current = first
        .state
        .current_file
        .as_deref()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap();
    let removed: Vec<String> = first
        .state
        .remaining
        .iter()
        .map(|r| r.name.clone())
        .filter(|name| *name != current)
        .collect();
    assert_eq!(removed.len(), 3);
    for name in &removed {
        fs::remove_file(h.fixture.root().join(name)).unwrap();
    }

    let snap = h.registry.wait(&id).unwrap();
    let state = &snap.state;
    assert_eq!(state.stage, Stage::Failed);
    assert!(!state.done);
    let error = state.error.as_deref().unwrap();
    assert!(removed.iter().any(|name| error.contains(name.as_str())));
    assert_eq!(state.scanned_names, [current.clone()]);

    let report = h.report(&id);
    assert_eq!(report.videos.len(), 1);
    assert_eq!(report.videos[0].name, current);
    assert_eq!(report.progress, "1/4");

    let cache_file = &h.registry.settings().cache_file;
    assert!(cache_file.exists());
    let cache = fs::read_to_string(cache_file).unwrap();
    assert!(cache.contains(&current));
    assert!(removed.iter().all(|name| !cache.contains(name.as_str())));
}

#[test]
fn test_stop_while_paused_exits() {
    let h = Harness::with_tool(MockMediaTool::new().with_delay(Duration::from_millis(25)));
    for i in 0..4 {
        h.fixture.video(&format!("v{}.mp4", i), 64 * 1024, i);
    }

    let id = h.registry.create(h.fixture.root(), false).unwrap();
    h.registry.pause(&id).unwrap();
    assert!(h.registry.snapshot(&id).unwrap().paused);

    h.registry.stop(&id).unwrap();
    let snap = h.registry.wait(&id).unwrap();
    assert_eq!(snap.state.stage, Stage::Stopped);
    assert!(!snap.paused);
}

#[test]
fn test_pause_resume_matches_uninterrupted_run() {
    let baseline = Harness::new();
    let paused = Harness::with_tool(MockMediaTool::new().with_delay(Duration::from_millis(20)));
    for h in [&baseline, &paused] {
        for i in 0..5 {
            h.fixture.video(&format!("v{}.mp4", i), 128 * 1024, i % 3);
        }
    }

    let (base_id, _) = baseline.scan();

    let id = paused.registry.create(paused.fixture.root(), false).unwrap();
    paused.wait_until(&id, |s| s.state.stage == Stage::Hashing && s.state.progress >= 1);
    paused.registry.pause(&id).unwrap();

    thread::sleep(Duration::from_millis(80));
    let held = paused.registry.snapshot(&id).unwrap();
    thread::sleep(Duration::from_millis(150));
    let still = paused.registry.snapshot(&id).unwrap();
    assert!(still.paused);
    assert_eq!(held.state.progress, still.state.progress);
    assert_eq!(held.state.scanned_names, still.state.scanned_names);

    paused.registry.resume(&id).unwrap();
    let snap = paused.registry.wait(&id).unwrap();
    assert!(snap.state.done);

    assert_eq!(record_set(&baseline.report(&base_id)), record_set(&paused.report(&id)));
}

#[test]
fn test_rename_collision_keeps_both_files() {
    let h = Harness::new();
    h.fixture.video("movie.mp4", 4096, 1);
    h.fixture.video("movie_720m.mp4", 4096, 2);

    let (_, snap) = h.scan();
    assert!(snap.state.done);
    assert!(h.fixture.root().join("movie.mp4").exists());
    assert!(h.fixture.root().join("movie_720m.mp4").exists());
    assert_eq!(snap.state.dup_groups, 0);
}

#[test]
fn test_report_written_under_root() {
    let h = Harness::new();
    h.fixture.video("a.mp4", 1000, 1);

    let (id, snap) = h.scan();
    let expected = h.registry.settings().root_dir.join(format!("video_hashes_{}.json", id));
    assert_eq!(snap.state.json_path.as_deref(), Some(expected.as_path()));
    assert_eq!(h.report(&id).scanned_folder, fs::canonicalize(h.fixture.root()).unwrap());
    assert!(Path::new(&expected).exists());
}
