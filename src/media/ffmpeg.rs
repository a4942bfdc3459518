//! ffmpeg/ffprobe backed media tool
//!
//! Both tools run as blocking child processes. Their stderr is captured and
//! folded into the error message when they exit unsuccessfully.

use crate::core::config::MediaConfig;
use crate::core::error::{Result, ScanError};
use crate::media::traits::MediaTool;
use log::{debug, trace};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Runs the ffmpeg and ffprobe executables
#[derive(Debug, Clone)]
pub struct FfmpegTool {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: ProbeFormat,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

impl FfmpegTool {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    pub fn from_config(config: &MediaConfig) -> Self {
        Self::new(&config.ffmpeg_path, &config.ffprobe_path)
    }

    fn run(&self, program: &Path, args: &[String]) -> Result<Output> {
        trace!("Running {} {}", program.display(), args.join(" "));
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| ScanError::Tool(format!("failed to launch {}: {}", program.display(), e)))?;

        if !output.status.success() {
            return Err(ScanError::Tool(format!(
                "{} exited with {}: {}",
                program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(output)
    }

    fn ffmpeg_args(source: &Path, seek_secs: f64, width: u32) -> Vec<String> {
        vec![
            "-y".into(),
            "-loglevel".into(),
            "error".into(),
            "-ss".into(),
            format!("{:.3}", seek_secs),
            "-i".into(),
            source.to_string_lossy().into_owned(),
            "-vf".into(),
            format!("scale={}:-1", width),
        ]
    }
}

impl Default for FfmpegTool {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl MediaTool for FfmpegTool {
    fn probe_duration(&self, source: &Path) -> Option<f64> {
        let args: Vec<String> = vec![
            "-v".into(),
            "error".into(),
            "-select_streams".into(),
            "v:0".into(),
            "-show_entries".into(),
            "format=duration".into(),
            "-of".into(),
            "json".into(),
            source.to_string_lossy().into_owned(),
        ];

        let output = match self.run(&self.ffprobe, &args) {
            Ok(output) => output,
            Err(e) => {
                debug!("Probe failed for {}: {}", source.display(), e);
                return None;
            }
        };

        parse_probe_duration(&output.stdout)
    }

    fn extract_frame(&self, source: &Path, seek_secs: f64, width: u32, dest: &Path) -> Result<()> {
        let mut args = Self::ffmpeg_args(source, seek_secs, width);
        args.extend(["-frames:v".into(), "1".into()]);
        args.push(dest.to_string_lossy().into_owned());
        self.run(&self.ffmpeg, &args).map(|_| ())
    }

    fn extract_clip(
        &self,
        source: &Path,
        seek_secs: f64,
        seconds: u32,
        width: u32,
        dest: &Path,
    ) -> Result<()> {
        let mut args = Self::ffmpeg_args(source, seek_secs, width);
        args.extend(["-t".into(), seconds.to_string(), "-an".into()]);
        args.push(dest.to_string_lossy().into_owned());
        self.run(&self.ffmpeg, &args).map(|_| ())
    }
}

/// Pull `format.duration` out of ffprobe's JSON output
fn parse_probe_duration(stdout: &[u8]) -> Option<f64> {
    let probe: ProbeOutput = serde_json::from_slice(stdout).ok()?;
    probe
        .format
        .duration?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_duration() {
        let json = br#"{ "programs": [], "format": { "duration": "12.480000" } }"#;
        assert_eq!(parse_probe_duration(json), Some(12.48));
    }

    #[test]
    fn test_parse_probe_duration_missing_or_bad() {
        assert_eq!(parse_probe_duration(br#"{ "format": {} }"#), None);
        assert_eq!(parse_probe_duration(br#"{ "format": { "duration": "N/A" } }"#), None);
        assert_eq!(parse_probe_duration(b"not json"), None);
        assert_eq!(parse_probe_duration(br#"{ "format": { "duration": "0" } }"#), None);
    }

    #[test]
    fn test_ffmpeg_args_seek_before_input() {
        let args = FfmpegTool::ffmpeg_args(Path::new("/v/a.mp4"), 2.0, 320);
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(ss < input);
        assert_eq!(args[ss + 1], "2.000");
        assert!(args.contains(&"scale=320:-1".to_string()));
    }

    #[test]
    fn test_missing_binary_is_a_tool_error() {
        let tool = FfmpegTool::new("/nonexistent/ffmpeg", "/nonexistent/ffprobe");
        assert_eq!(tool.probe_duration(Path::new("/v/a.mp4")), None);

        let err = tool
            .extract_frame(Path::new("/v/a.mp4"), 1.0, 320, Path::new("/tmp/out.jpg"))
            .unwrap_err();
        assert!(matches!(err, ScanError::Tool(_)));
    }
}
