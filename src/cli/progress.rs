//! Progress display utilities for CLI output
//!
//! The scan display polls job snapshots rather than receiving callbacks, so
//! it only ever reads state. Stage changes are printed as log lines above the
//! bar; the bar itself tracks the current stage's file count.

use crate::core::job::{JobSnapshot, Stage};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::sync::Mutex;
use std::time::{Duration, Instant};

// ============================================================================
// Styles - Consistent visual appearance
// ============================================================================

fn progress_bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("  {spinner:.green} [{bar:40.cyan/dim}] {pos}/{len} ({percent}%) {msg}")
        .unwrap()
        .progress_chars("━━╾─")
}

fn completed_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("  ✓ [{bar:40.green/dim}] {pos}/{len} ({percent}%) {msg}")
        .unwrap()
        .progress_chars("━━━")
}

// ============================================================================
// Console output helpers
// ============================================================================

/// Print a header section with a box
pub fn print_header(title: &str) {
    let width = 68;
    let title_padded = format!("{:^width$}", title, width = width - 4);
    println!();
    println!("╔{}╗", "═".repeat(width - 2));
    println!("║{}║", title_padded);
    println!("╚{}╝", "═".repeat(width - 2));
    println!();
}

/// Print a section divider
pub fn print_divider() {
    println!();
    println!("{}", "─".repeat(60));
    println!();
}

pub fn print_success(msg: &str) {
    println!("  ✓ {}", msg);
}

pub fn print_info(msg: &str) {
    println!("  • {}", msg);
}

pub fn print_warning(msg: &str) {
    println!("  ⚠ {}", msg);
}

pub fn print_error(msg: &str) {
    println!("  ✗ {}", msg);
}

// ============================================================================
// Live scan display
// ============================================================================

/// Renders job snapshots as a progress bar
pub struct ScanProgressDisplay {
    progress_bar: ProgressBar,
    start_time: Instant,
    last_stage: Mutex<Option<Stage>>,
}

impl ScanProgressDisplay {
    pub fn new() -> Self {
        let progress_bar = ProgressBar::new(0);
        progress_bar.set_style(progress_bar_style());
        progress_bar.enable_steady_tick(Duration::from_millis(100));
        progress_bar.set_message("Discovering videos...");

        Self {
            progress_bar,
            start_time: Instant::now(),
            last_stage: Mutex::new(None),
        }
    }

    /// Refresh the bar from a snapshot
    pub fn update(&self, snapshot: &JobSnapshot) {
        let state = &snapshot.state;
        if let Ok(mut last) = self.last_stage.lock() {
            if *last != Some(state.stage) {
                *last = Some(state.stage);
                if state.stage.number().is_some() {
                    self.log(&format!("→ {}", state.stage.label()));
                }
            }
        }

        self.progress_bar.set_length(state.total as u64);
        self.progress_bar.set_position(state.progress as u64);
        self.progress_bar.set_message(status_message(snapshot));
    }

    /// Log a message while suspending the progress display
    pub fn log(&self, msg: &str) {
        self.progress_bar.suspend(|| {
            println!("  {}", msg);
        });
    }

    pub fn log_warning(&self, msg: &str) {
        self.progress_bar.suspend(|| {
            println!("  ⚠ {}", msg);
        });
    }

    /// Close the bar according to how the job ended
    pub fn finish(&self, snapshot: &JobSnapshot) {
        let elapsed = format_duration(self.start_time.elapsed());
        match snapshot.state.stage {
            Stage::Complete => {
                self.progress_bar.set_style(completed_style());
                self.progress_bar.finish_with_message(format!(
                    "Complete ({} in {})",
                    format_bytes(snapshot.state.bytes_scanned),
                    elapsed
                ));
            }
            Stage::Failed => self.progress_bar.abandon_with_message(format!(
                "✗ {}",
                snapshot.state.error.as_deref().unwrap_or("failed")
            )),
            _ => self
                .progress_bar
                .abandon_with_message(format!("Stopped after {}", elapsed)),
        }
    }
}

impl Default for ScanProgressDisplay {
    fn default() -> Self {
        Self::new()
    }
}

/// One-line status for the bar message
pub fn status_message(snapshot: &JobSnapshot) -> String {
    let state = &snapshot.state;
    let paused = if snapshot.paused { "[paused] " } else { "" };
    let current = state
        .current_file
        .as_ref()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut message = if state.stage == Stage::Hashing {
        format!(
            "{}{} {:.0}% | {}/{} | {} MB/s | ETA {} | dupes {}",
            paused,
            current,
            state.file_pct,
            format_bytes(state.bytes_scanned),
            format_bytes(state.bytes_total),
            state.speed,
            format_duration(Duration::from_secs(state.eta)),
            format_bytes(state.duplicate_bytes),
        )
    } else {
        format!("{}{}", paused, current)
    };

    // gauges stay zero until the first per-file update
    if state.free > 0.0 || state.mem > 0.0 {
        message.push_str(&format!(
            " | cpu {:.0}% mem {:.0}% free {:.1} GB",
            state.cpu, state.mem, state.free
        ));
    }
    message
}

// ============================================================================
// Utility functions
// ============================================================================

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Format duration as human-readable string
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        format!("{}h {}m", hours, mins)
    } else if secs >= 60 {
        let mins = secs / 60;
        let secs = secs % 60;
        format!("{}m {}s", mins, secs)
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}

// ============================================================================
// Dual writer for file + console logging
// ============================================================================

/// A writer that writes to both console and file
///
/// Used for logging to both stderr and a log file simultaneously.
pub struct DualWriter {
    pub console: std::io::Stderr,
    pub file: std::fs::File,
}

impl Write for DualWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let _ = self.console.write(buf);
        self.file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let _ = self.console.flush();
        self.file.flush()
    }
}

// ============================================================================
// Tests
// ============================================================================
