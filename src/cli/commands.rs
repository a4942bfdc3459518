//! Command handlers for the CLI
//!
//! This module contains the implementation of all CLI commands.

use crate::cli::progress::{
    format_bytes, print_divider, print_error, print_header, print_info, print_success,
    print_warning, ScanProgressDisplay,
};
use crate::cli::{Args, Commands};
use crate::core::config::{get_config_path, init_config, Config};
use crate::core::job::{JobCommand, JobSnapshot, Stage};
use crate::core::registry::JobRegistry;
use crate::core::report::ScanReport;
use crate::duplicate::FileRecord;
use crate::media::FfmpegTool;
use anyhow::{Context, Result};
use crossbeam_channel::{never, select, tick, unbounded, Receiver};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// How often the scan display polls the job snapshot
const POLL_INTERVAL: Duration = Duration::from_millis(400);

/// Run the appropriate command based on CLI arguments
pub fn run_command(args: &Args, config: &Config, shutdown_flag: Arc<AtomicBool>) -> Result<()> {
    match &args.command {
        Commands::Scan { folder, verify } => scan_folder(config, folder, *verify, shutdown_flag),
        Commands::Report { file, unique } => show_report(file, *unique),
        Commands::Config { path } => handle_config_command(*path),
        Commands::GenerateConfig { output } => generate_config_file(output.clone()),
        Commands::ShowConfig => {
            show_config(config);
            Ok(())
        }
    }
}

// ============================================================================
// Scan
// ============================================================================

/// Run one scan job in the foreground with a live progress display
pub fn scan_folder(
    config: &Config,
    folder: &Path,
    verify: bool,
    shutdown_flag: Arc<AtomicBool>,
) -> Result<()> {
    let tool = Arc::new(FfmpegTool::from_config(&config.media));
    let registry = JobRegistry::new(config.scan_settings(), tool)
        .context("Failed to prepare output directories")?;
    let id = registry
        .create(folder, verify)
        .with_context(|| format!("Cannot scan {}", folder.display()))?;

    print_header("Video Duplicate Scan");
    print_info(&format!("Folder: {}", folder.display()));
    print_info(&format!("Job: {}", id));
    print_info(&format!(
        "Output: {}",
        registry.settings().root_dir.display()
    ));
    print_info("Type pause, resume or stop and press Enter to control the scan");
    println!();

    let display = ScanProgressDisplay::new();
    let ticker = tick(POLL_INTERVAL);
    let commands = spawn_command_reader();
    let idle: Receiver<String> = never();
    let mut stdin_open = true;
    let mut stop_sent = false;

    loop {
        let input = if stdin_open { &commands } else { &idle };
        select! {
            recv(ticker) -> _ => {
                if shutdown_flag.load(Ordering::SeqCst) && !stop_sent {
                    registry.stop(&id)?;
                    stop_sent = true;
                }
                let snapshot = registry.snapshot(&id)?;
                display.update(&snapshot);
                if snapshot.is_finished() {
                    break;
                }
            }
            recv(input) -> line => match line {
                Ok(line) => match line.parse::<JobCommand>() {
                    Ok(command) => {
                        registry.control(&id, command)?;
                        display.log(&format!("→ {:?}", command));
                    }
                    Err(e) => display.log_warning(&e.to_string()),
                },
                Err(_) => {
                    debug!("stdin closed, scan controls disabled");
                    stdin_open = false;
                }
            },
        }
    }

    let snapshot = registry.wait(&id)?;
    display.finish(&snapshot);
    print_scan_summary(&snapshot);

    match snapshot.state.error {
        Some(ref error) => anyhow::bail!("Scan failed: {}", error),
        None => Ok(()),
    }
}

/// Forward non-empty stdin lines to a channel
fn spawn_command_reader() -> Receiver<String> {
    let (tx, rx) = unbounded();
    let spawned = thread::Builder::new()
        .name("scan-commands".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if line.trim().is_empty() {
                    continue;
                }
                if tx.send(line).is_err() {
                    break;
                }
            }
        });

    match spawned {
        Ok(_) => rx,
        Err(e) => {
            warn!("Could not read scan commands from stdin: {}", e);
            never()
        }
    }
}

fn print_scan_summary(snapshot: &JobSnapshot) {
    let state = &snapshot.state;
    print_divider();

    match state.stage {
        Stage::Complete => print_success(&format!("Scanned {} videos", state.total)),
        Stage::Stopped => print_warning(&format!(
            "Scan stopped after {} of {} videos",
            state.scanned_names.len(),
            state.total
        )),
        _ => print_error(state.error.as_deref().unwrap_or("Scan failed")),
    }

    print_info(&format!(
        "Hashed: {}  From cache: {}",
        state.files_hashed, state.cache_hits
    ));
    print_info(&format!(
        "Data scanned: {} of {}",
        format_bytes(state.bytes_scanned),
        format_bytes(state.bytes_total)
    ));

    if state.duplicates.is_empty() {
        print_success("No duplicates found");
    } else {
        print_warning(&format!(
            "{} duplicate groups, {} in duplicated files (largest group: {})",
            state.dup_groups,
            format_bytes(state.duplicate_bytes),
            state.largest_group
        ));
        print_duplicate_groups(&state.duplicates);
    }

    if let Some(path) = &state.json_path {
        println!();
        print_info(&format!("Report: {}", path.display()));
    }
}

fn print_duplicate_groups(groups: &BTreeMap<String, Vec<FileRecord>>) {
    for (digest, records) in groups {
        println!();
        println!(
            "  {} ({} copies, {} each)",
            short_digest(digest),
            records.len(),
            format_bytes(records.first().map(|r| r.size).unwrap_or(0))
        );
        for record in records {
            println!("      {}", record.path.display());
        }
    }
}

fn short_digest(digest: &str) -> &str {
    digest.get(..12).unwrap_or(digest)
}

// ============================================================================
// Report
// ============================================================================

/// Print a persisted report
pub fn show_report(path: &Path, unique: bool) -> Result<()> {
    let report = ScanReport::load(path)?;

    print_header("Scan Report");
    print_info(&format!("Folder: {}", report.scanned_folder.display()));
    print_info(&format!("Scanned at: {}", report.scanned_at));
    print_info(&format!("Progress: {}", report.progress));
    print_info(&format!("Videos: {}", report.videos.len()));

    if unique {
        let videos = report.unique_videos();
        print_divider();
        print_success(&format!("{} distinct videos", videos.len()));
        for video in videos {
            println!(
                "  {:>10}  {}  {}",
                format_bytes(video.size),
                short_digest(&video.digest),
                video.path.display()
            );
        }
        return Ok(());
    }

    if report.duplicates.is_empty() {
        print_success("No duplicates found");
        return Ok(());
    }

    let reclaimable: u64 = report.redundant_videos().iter().map(|r| r.size).sum();
    print_warning(&format!(
        "{} duplicate groups, {} in duplicated files, {} reclaimable",
        report.duplicates.len(),
        format_bytes(report.dup_bytes),
        format_bytes(reclaimable)
    ));
    print_duplicate_groups(&report.duplicates);
    Ok(())
}

// ============================================================================
// Configuration
// ============================================================================

/// Create the standard config file if needed and print where it lives
pub fn handle_config_command(show_path: bool) -> Result<()> {
    if show_path {
        let path = Config::get_active_config_path();
        println!("{}", path.display());
        if path.exists() {
            info!("Config file exists at: {}", path.display());
        } else {
            info!("Config file would be created at: {}", path.display());
        }
        return Ok(());
    }

    let path = init_config()?;
    info!("Config file: {}", path.display());
    info!("Edit this file to customize scanning, then run 'video-dedupe show-config'.");
    Ok(())
}

/// Generate a configuration file at the specified or default location
pub fn generate_config_file(output: Option<PathBuf>) -> Result<()> {
    let output_path = match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, Config::generate_default_config())?;
            path
        }
        None => init_config()?,
    };

    info!("Configuration file: {}", output_path.display());
    info!("Edit this file to customize the scan settings.");
    Ok(())
}

/// Show the current configuration settings
pub fn show_config(config: &Config) {
    let config_path = Config::get_active_config_path();
    info!("Configuration file: {}", config_path.display());
    if !config_path.exists() {
        info!("(Using default settings - no config file found)");
    }
    if let Some(standard) = get_config_path() {
        debug!("Standard config location: {}", standard.display());
    }
    info!("");
    info!("Current Configuration:");
    info!("----------------------");
    info!("[output]");
    info!("  root_dir = \"{}\"", config.output.root_dir.display());
    info!("");
    info!("[scan]");
    info!("  video_extensions = {:?}", config.scan.video_extensions);
    info!("  chunk_size = {}", config.scan.chunk_size);
    info!("  marker_pattern = {:?}", config.scan.marker_pattern);
    info!(
        "  rename_min_duration_ms = {}",
        config.scan.rename_min_duration_ms
    );
    info!(
        "  rename_min_per_file_ms = {}",
        config.scan.rename_min_per_file_ms
    );
    info!("  load_delay_ms = {}", config.scan.load_delay_ms);
    info!("");
    info!("[media]");
    info!("  ffmpeg_path = \"{}\"", config.media.ffmpeg_path.display());
    info!("  ffprobe_path = \"{}\"", config.media.ffprobe_path.display());
    info!("  thumbnail_width = {}", config.media.thumbnail_width);
    info!("  preview_seconds = {}", config.media.preview_seconds);
    info!(
        "  placeholder = {}x{} {:?}",
        config.media.placeholder_width,
        config.media.placeholder_height,
        config.media.placeholder_color
    );
    info!(
        "  fallback_duration_secs = {}",
        config.media.fallback_duration_secs
    );
    info!("");
    info!("[logging]");
    info!("  level = \"{}\"", config.logging.level);
    info!("  log_to_file = {}", config.logging.log_to_file);
    info!("  log_file = \"{}\"", config.logging.log_file.display());
}
