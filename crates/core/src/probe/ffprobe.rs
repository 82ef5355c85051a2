//! FFprobe-based prober and the ffprobe JSON model shared with the decoder.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use crate::codec::FfmpegConfig;

use super::traits::Prober;
use super::types::SourceFile;

const PROBE_ARGS: [&str; 6] = [
    "-v",
    "quiet",
    "-print_format",
    "json",
    "-show_format",
    "-show_streams",
];

/// Errors from running ffprobe. Never surfaced by [`Prober::probe`].
#[derive(Debug, Error)]
pub(crate) enum ProbeError {
    #[error("file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("ffprobe not found at path: {path}")]
    FfprobeNotFound { path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ffprobe exited with code {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },

    #[error("failed to parse ffprobe output: {0}")]
    Parse(String),
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ProbeOutput {
    #[serde(default)]
    pub format: Option<ProbeFormat>,
    #[serde(default)]
    pub streams: Vec<ProbeStream>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ProbeFormat {
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ProbeStream {
    #[serde(default)]
    pub codec_type: Option<String>,
    #[serde(default)]
    pub codec_name: Option<String>,
    #[serde(default)]
    pub codec_long_name: Option<String>,
    #[serde(default)]
    pub sample_rate: Option<String>,
    #[serde(default)]
    pub channels: Option<u16>,
    #[serde(default)]
    pub time_base: Option<String>,
    #[serde(default)]
    pub duration_ts: Option<u64>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl ProbeOutput {
    pub fn parse(json: &str) -> Result<Self, ProbeError> {
        serde_json::from_str(json).map_err(|e| ProbeError::Parse(e.to_string()))
    }

    /// The first audio stream.
    pub fn audio_stream(&self) -> Option<&ProbeStream> {
        self.streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("audio"))
    }

    /// Container duration, falling back to the audio stream's duration.
    pub fn duration_secs(&self) -> Option<f64> {
        self.format
            .as_ref()
            .and_then(|f| parse_secs(f.duration.as_deref()))
            .or_else(|| self.audio_stream().and_then(|s| s.duration_secs()))
    }

    /// Looks a tag up case-insensitively, container tags first.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.format
            .as_ref()
            .and_then(|f| find_tag(&f.tags, key))
            .or_else(|| self.audio_stream().and_then(|s| find_tag(&s.tags, key)))
    }
}

impl ProbeStream {
    pub fn sample_rate(&self) -> Option<u32> {
        self.sample_rate.as_deref().and_then(|r| r.parse().ok())
    }

    pub fn duration_secs(&self) -> Option<f64> {
        parse_secs(self.duration.as_deref())
    }

    /// Parses a time base like "1/44100".
    pub fn time_base(&self) -> Option<(u64, u64)> {
        let (num, den) = self.time_base.as_deref()?.split_once('/')?;
        let num = num.trim().parse().ok()?;
        let den = den.trim().parse().ok()?;
        if den == 0 {
            None
        } else {
            Some((num, den))
        }
    }

    /// Total frames at the stream's own sample rate.
    ///
    /// Exact when the time base is one tick per sample, estimated from the
    /// duration otherwise.
    pub fn total_frames(&self, fallback_secs: Option<f64>) -> Option<u64> {
        let rate = self.sample_rate()?;
        if let (Some((1, den)), Some(ts)) = (self.time_base(), self.duration_ts) {
            if den == u64::from(rate) {
                return Some(ts);
            }
        }
        let secs = self.duration_secs().or(fallback_secs)?;
        Some((secs * f64::from(rate)).round() as u64)
    }

    /// Human-readable codec description.
    pub fn description(&self) -> String {
        self.codec_long_name
            .clone()
            .or_else(|| self.codec_name.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

fn parse_secs(value: Option<&str>) -> Option<f64> {
    value
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
}

fn find_tag<'a>(tags: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    tags.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.as_str())
}

fn map_spawn_error(ffprobe_path: &Path, e: std::io::Error) -> ProbeError {
    if e.kind() == std::io::ErrorKind::NotFound {
        ProbeError::FfprobeNotFound {
            path: ffprobe_path.to_path_buf(),
        }
    } else {
        ProbeError::Io(e)
    }
}

fn decode_output(output: std::process::Output) -> Result<ProbeOutput, ProbeError> {
    if !output.status.success() {
        return Err(ProbeError::Failed {
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    ProbeOutput::parse(&String::from_utf8_lossy(&output.stdout))
}

/// Runs ffprobe on the async runtime.
pub(crate) async fn run_ffprobe(ffprobe_path: &Path, path: &Path) -> Result<ProbeOutput, ProbeError> {
    if !path.exists() {
        return Err(ProbeError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let output = Command::new(ffprobe_path)
        .args(PROBE_ARGS)
        .arg(path)
        .output()
        .await
        .map_err(|e| map_spawn_error(ffprobe_path, e))?;

    decode_output(output)
}

/// Runs ffprobe on the calling thread.
pub(crate) fn run_ffprobe_blocking(
    ffprobe_path: &Path,
    path: &Path,
) -> Result<ProbeOutput, ProbeError> {
    if !path.exists() {
        return Err(ProbeError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let output = std::process::Command::new(ffprobe_path)
        .args(PROBE_ARGS)
        .arg(path)
        .output()
        .map_err(|e| map_spawn_error(ffprobe_path, e))?;

    decode_output(output)
}

/// Builds a [`SourceFile`] from parsed ffprobe output.
pub(crate) fn source_file_from_probe(path: &Path, output: &ProbeOutput) -> SourceFile {
    if output.audio_stream().is_none() {
        return SourceFile::unprobed(path);
    }

    let duration_ms = output
        .duration_secs()
        .map(|secs| (secs * 1000.0).round() as i64)
        .unwrap_or(SourceFile::UNKNOWN_DURATION);

    SourceFile {
        path: path.to_path_buf(),
        duration_ms,
        valid: true,
        artist: output.tag("artist").unwrap_or_default().to_string(),
        title: output.tag("title").unwrap_or_default().to_string(),
        album: output.tag("album").unwrap_or_default().to_string(),
    }
}

/// FFprobe-based prober.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    ffprobe_path: PathBuf,
}

impl FfprobeProber {
    pub fn new(ffprobe_path: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
        }
    }

    pub fn from_config(config: &FfmpegConfig) -> Self {
        Self::new(config.ffprobe_path.clone())
    }
}

impl Default for FfprobeProber {
    fn default() -> Self {
        Self::from_config(&FfmpegConfig::default())
    }
}

#[async_trait]
impl Prober for FfprobeProber {
    fn name(&self) -> &str {
        "ffprobe"
    }

    async fn probe(&self, path: &Path) -> SourceFile {
        match run_ffprobe(&self.ffprobe_path, path).await {
            Ok(output) => source_file_from_probe(path, &output),
            Err(e) => {
                debug!("Probe of {} failed: {}", path.display(), e);
                SourceFile::unprobed(path)
            }
        }
    }
}
