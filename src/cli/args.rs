//! Command-line argument definitions
//!
//! This module defines all CLI arguments and subcommands using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Find byte-identical videos, with thumbnails and previews for review
#[derive(Parser, Debug)]
#[command(name = "video-dedupe")]
#[command(author = "Vihaan Reddy M")]
#[command(version = "1.0.0")]
#[command(about = "Scan a folder of videos, clean up their names and find exact duplicates", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level: error, warn, info, debug, trace (overrides config)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Directory for thumbnails, previews, the hash cache and reports (overrides config)
    #[arg(long, global = true, value_name = "DIR")]
    pub root_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan a folder: rename, extract previews and thumbnails, hash and group duplicates
    ///
    /// While the scan runs, type `pause`, `resume` or `stop` and press Enter.
    /// Ctrl+C stops the scan after the current chunk; press it again to quit
    /// immediately.
    Scan {
        /// Folder to scan (searched recursively)
        folder: PathBuf,

        /// Mark the job for verification after hashing
        #[arg(long)]
        verify: bool,
    },

    /// Print a saved scan report
    Report {
        /// Report file (video_hashes_<job-id>.json)
        file: PathBuf,

        /// List one entry per distinct video instead of the duplicate groups
        #[arg(long)]
        unique: bool,
    },

    /// Create the configuration file at the standard location if missing
    ///
    /// The config file is stored at:
    /// - Windows: %APPDATA%\video_dedupe_tool\config.toml
    /// - Linux/macOS: ~/.config/video_dedupe_tool/config.toml
    Config {
        /// Only print the config file path
        #[arg(long)]
        path: bool,
    },

    /// Generate a configuration file at a specific location
    GenerateConfig {
        /// Output path for the config file (defaults to standard location)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show current configuration
    ShowConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_with_global_flags() {
        let args = Args::try_parse_from([
            "video-dedupe",
            "scan",
            "/videos",
            "--verify",
            "--root-dir",
            "/tmp/hashed",
            "-l",
            "debug",
        ])
        .unwrap();

        assert_eq!(args.root_dir, Some(PathBuf::from("/tmp/hashed")));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        match args.command {
            Commands::Scan { folder, verify } => {
                assert_eq!(folder, PathBuf::from("/videos"));
                assert!(verify);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_report_unique() {
        let args = Args::try_parse_from(["video-dedupe", "report", "r.json", "--unique"]).unwrap();
        assert!(matches!(args.command, Commands::Report { unique: true, .. }));
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Args::try_parse_from(["video-dedupe"]).is_err());
        assert!(Args::try_parse_from(["video-dedupe", "scan"]).is_err());
    }
}
