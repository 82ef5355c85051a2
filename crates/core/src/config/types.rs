use serde::{Deserialize, Serialize};

use crate::binder::DEFAULT_BUFFER_SIZE;
use crate::codec::FfmpegConfig;
use crate::plan::RunConfig;

/// Root settings
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub ffmpeg: FfmpegConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    /// Run configuration used when a job does not override it.
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Bytes of canonical PCM moved per chunk.
    #[serde(default = "default_buffer_size")]
    pub buffer_size_bytes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            buffer_size_bytes: default_buffer_size(),
        }
    }
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
