//! Configuration module for the video dedupe tool
//!
//! Supports loading configuration from a TOML file.
//! Configuration is stored in a standard location:
//! - Windows: %APPDATA%\video_dedupe_tool\config.toml
//! - Linux: ~/.config/video_dedupe_tool/config.toml
//! - macOS: ~/Library/Application Support/video_dedupe_tool/config.toml

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application name used for config directory
const APP_NAME: &str = "video_dedupe_tool";

/// Default config file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Config file names checked in the working directory, in order
const LOCAL_CONFIG_FILES: &[&str] = &["./config.toml", "./video_dedupe.toml"];

/// Get the standard configuration directory for the application.
pub fn get_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME))
}

/// Get the standard configuration file path.
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Ensure the configuration directory exists.
pub fn ensure_config_dir() -> Result<PathBuf, ConfigError> {
    let config_dir = get_config_dir().ok_or(ConfigError::ConfigDirNotFound)?;

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)
            .map_err(|e| ConfigError::WriteError(config_dir.clone(), e.to_string()))?;
    }

    Ok(config_dir)
}

/// Initialize the configuration file if it doesn't exist.
///
/// Returns the path to the config file.
pub fn init_config() -> Result<PathBuf, ConfigError> {
    let config_dir = ensure_config_dir()?;
    let config_path = config_dir.join(CONFIG_FILE_NAME);

    if !config_path.exists() {
        fs::write(&config_path, Config::generate_default_config())
            .map_err(|e| ConfigError::WriteError(config_path.clone(), e.to_string()))?;
    }

    Ok(config_path)
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where thumbnails, previews, the hash cache and reports are written
    pub output: OutputConfig,

    /// Scan pipeline settings
    pub scan: ScanConfig,

    /// External media tool settings
    pub media: MediaConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// Output directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Root folder for all generated artifacts
    pub root_dir: PathBuf,
}

/// Scan pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// File extensions treated as video (lowercase, without the dot)
    pub video_extensions: Vec<String>,

    /// Read size for content hashing, in bytes
    pub chunk_size: usize,

    /// Regex stripped from file names during the rename stage (case-insensitive)
    pub marker_pattern: String,

    /// Minimum total wall-clock duration of the rename stage
    pub rename_min_duration_ms: u64,

    /// Minimum pause between two renames
    pub rename_min_per_file_ms: u64,

    /// Pause after the file list is prepared, before hashing starts
    pub load_delay_ms: u64,
}

/// External media tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// ffmpeg executable
    pub ffmpeg_path: PathBuf,

    /// ffprobe executable
    pub ffprobe_path: PathBuf,

    /// Width of thumbnails and preview clips (height follows aspect ratio)
    pub thumbnail_width: u32,

    /// Length of preview clips in seconds
    pub preview_seconds: u32,

    /// Placeholder thumbnail width
    pub placeholder_width: u32,

    /// Placeholder thumbnail height
    pub placeholder_height: u32,

    /// Placeholder thumbnail fill color (RGB)
    pub placeholder_color: [u8; 3],

    /// Duration assumed when probing fails
    pub fallback_duration_secs: f64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log to file
    pub log_to_file: bool,

    /// Log file path
    pub log_file: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("./hashed"),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            video_extensions: ["mp4", "mkv", "avi", "mov", "wmv", "flv", "webm"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
            chunk_size: 1 << 20,
            marker_pattern: "[_-]?720m".to_string(),
            rename_min_duration_ms: 1000,
            rename_min_per_file_ms: 150,
            load_delay_ms: 500,
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            thumbnail_width: 320,
            preview_seconds: 5,
            placeholder_width: 320,
            placeholder_height: 180,
            placeholder_color: [220, 0, 0],
            fallback_duration_secs: 4.0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_to_file: false,
            log_file: PathBuf::from("./video_dedupe.log"),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e.to_string()))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;

        Ok(config)
    }

    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./config.toml
    /// 2. ./video_dedupe.toml
    /// 3. Standard config location
    ///
    /// If no config file is found, returns default configuration.
    pub fn load_default() -> Result<Self, ConfigError> {
        for path in LOCAL_CONFIG_FILES {
            let path = Path::new(path);
            if path.exists() {
                return Self::load(path);
            }
        }

        if let Some(config_path) = get_config_path() {
            if config_path.exists() {
                return Self::load(&config_path);
            }
        }

        Ok(Self::default())
    }

    /// Get the path where the config file is (or would be) located.
    pub fn get_active_config_path() -> PathBuf {
        LOCAL_CONFIG_FILES
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
            .or_else(get_config_path)
            .unwrap_or_else(|| PathBuf::from("./config.toml"))
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        fs::write(path.as_ref(), content)
            .map_err(|e| ConfigError::WriteError(path.as_ref().to_path_buf(), e.to_string()))?;

        Ok(())
    }

    /// Generate a default config file with comments
    pub fn generate_default_config() -> String {
        include_str!("../../config.example.toml").to_string()
    }

    /// Resolve the runtime settings used by the scan pipeline
    pub fn scan_settings(&self) -> ScanSettings {
        let root = &self.output.root_dir;
        ScanSettings {
            root_dir: root.clone(),
            thumb_dir: root.join("thumbnails"),
            preview_dir: root.join("previews"),
            cache_file: root.join("hash_cache.json"),
            video_extensions: self
                .scan
                .video_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            chunk_size: self.scan.chunk_size.max(1),
            marker_pattern: self.scan.marker_pattern.clone(),
            rename_min_duration: Duration::from_millis(self.scan.rename_min_duration_ms),
            rename_min_per_file: Duration::from_millis(self.scan.rename_min_per_file_ms),
            load_delay: Duration::from_millis(self.scan.load_delay_ms),
            thumbnail_width: self.media.thumbnail_width,
            preview_seconds: self.media.preview_seconds,
            placeholder_size: (
                self.media.placeholder_width,
                self.media.placeholder_height,
            ),
            placeholder_color: self.media.placeholder_color,
            fallback_duration_secs: self.media.fallback_duration_secs,
        }
    }
}

/// Runtime settings shared by every job started from one registry
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub root_dir: PathBuf,
    pub thumb_dir: PathBuf,
    pub preview_dir: PathBuf,
    pub cache_file: PathBuf,
    pub video_extensions: Vec<String>,
    pub chunk_size: usize,
    pub marker_pattern: String,
    pub rename_min_duration: Duration,
    pub rename_min_per_file: Duration,
    pub load_delay: Duration,
    pub thumbnail_width: u32,
    pub preview_seconds: u32,
    pub placeholder_size: (u32, u32),
    pub placeholder_color: [u8; 3],
    pub fallback_duration_secs: f64,
}

impl ScanSettings {
    /// Settings rooted at `root_dir` with every pacing delay disabled
    pub fn unpaced(root_dir: impl Into<PathBuf>) -> Self {
        let mut config = Config::default();
        config.output.root_dir = root_dir.into();
        config.scan.rename_min_duration_ms = 0;
        config.scan.rename_min_per_file_ms = 0;
        config.scan.load_delay_ms = 0;
        config.scan_settings()
    }

    /// Report file for one job
    pub fn report_path(&self, job_id: &str) -> PathBuf {
        self.root_dir.join(format!("video_hashes_{}.json", job_id))
    }

    /// Whether the path carries one of the configured video extensions
    pub fn is_video(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .is_some_and(|ext| self.video_extensions.iter().any(|v| *v == ext))
    }
}

/// Configuration error types
#[derive(Debug)]
pub enum ConfigError {
    /// Configuration file was not found at the specified path
    FileNotFound(PathBuf),
    /// Failed to read the configuration file
    ReadError(PathBuf, String),
    /// Failed to parse the configuration file (invalid TOML)
    ParseError(PathBuf, String),
    /// Failed to serialize configuration to TOML
    SerializeError(String),
    /// Failed to write configuration file
    WriteError(PathBuf, String),
    /// Could not determine config directory
    ConfigDirNotFound,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => {
                write!(f, "Configuration file not found: {}", path.display())
            }
            ConfigError::ReadError(path, err) => {
                write!(
                    f,
                    "Failed to read config file '{}': {}",
                    path.display(),
                    err
                )
            }
            ConfigError::ParseError(path, err) => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    err
                )
            }
            ConfigError::SerializeError(err) => {
                write!(f, "Failed to serialize configuration: {}", err)
            }
            ConfigError::WriteError(path, err) => {
                write!(
                    f,
                    "Failed to write config file '{}': {}",
                    path.display(),
                    err
                )
            }
            ConfigError::ConfigDirNotFound => {
                write!(f, "Could not determine configuration directory")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
