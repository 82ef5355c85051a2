//! Configuration for the ffmpeg codec backend.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where the ffmpeg tools live and how chatty they are.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FfmpegConfig {
    /// Program that decodes sources and encodes volumes.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Program that reads durations, tags and stream layouts.
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    /// Value passed to `-loglevel`. Only the last stderr lines reach error messages.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Additional encoder arguments, inserted before the output path.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_log_level() -> String {
    "error".to_string()
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            log_level: default_log_level(),
            extra_args: Vec::new(),
        }
    }
}

impl FfmpegConfig {
    /// Points both tools at explicit locations.
    pub fn with_paths(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg.into(),
            ffprobe_path: ffprobe.into(),
            ..Default::default()
        }
    }

    /// Sets the ffmpeg log level.
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_resolve_tools_from_path() {
        let config = FfmpegConfig::default();
        assert_eq!(config.ffmpeg_path.to_str(), Some("ffmpeg"));
        assert_eq!(config.ffprobe_path.to_str(), Some("ffprobe"));
        assert_eq!(config.log_level, "error");
        assert!(config.extra_args.is_empty());
    }

    #[test]
    fn test_with_paths_keeps_other_defaults() {
        let config = FfmpegConfig::with_paths("/opt/av/bin/ffmpeg", "/opt/av/bin/ffprobe")
            .with_log_level("warning");

        assert_eq!(config.ffmpeg_path, PathBuf::from("/opt/av/bin/ffmpeg"));
        assert_eq!(config.ffprobe_path, PathBuf::from("/opt/av/bin/ffprobe"));
        assert_eq!(config.log_level, "warning");
        assert!(config.extra_args.is_empty());
    }

    #[test]
    fn test_config_deserialize_partial() {
        let config: FfmpegConfig = toml::from_str(r#"ffmpeg_path = "/opt/ffmpeg""#).unwrap();
        assert_eq!(config.ffmpeg_path, PathBuf::from("/opt/ffmpeg"));
        assert_eq!(config.ffprobe_path, PathBuf::from("ffprobe"));
    }
}
