use super::{types::Settings, ConfigError};
use crate::binder::MIN_BUFFER_SIZE;

const FFMPEG_LOG_LEVELS: &[&str] = &[
    "quiet", "panic", "fatal", "error", "warning", "info", "verbose", "debug", "trace",
];

/// Validate settings
/// Currently validates:
/// - Engine buffer holds at least the minimum chunk
/// - Default run configuration can drive an encoder
/// - FFmpeg log level is one ffmpeg accepts
pub fn validate_settings(settings: &Settings) -> Result<(), ConfigError> {
    if settings.engine.buffer_size_bytes < MIN_BUFFER_SIZE {
        return Err(ConfigError::ValidationError(format!(
            "engine.buffer_size_bytes must be at least {}",
            MIN_BUFFER_SIZE
        )));
    }

    settings
        .run
        .validate()
        .map_err(|e| ConfigError::ValidationError(format!("run: {}", e)))?;

    if !FFMPEG_LOG_LEVELS.contains(&settings.ffmpeg.log_level.as_str()) {
        return Err(ConfigError::ValidationError(format!(
            "ffmpeg.log_level must be one of {}",
            FFMPEG_LOG_LEVELS.join(", ")
        )));
    }

    if settings.logging.level.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "logging.level cannot be empty".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{Channels, RunConfig};

    #[test]
    fn test_validate_default_settings() {
        assert!(validate_settings(&Settings::default()).is_ok());
    }

    #[test]
    fn test_validate_small_buffer_fails() {
        let mut settings = Settings::default();
        settings.engine.buffer_size_bytes = 512;
        let err = validate_settings(&settings).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_zero_sample_rate_fails() {
        let settings = Settings {
            run: RunConfig::new(Channels::Stereo, 0, 0),
            ..Default::default()
        };
        let err = validate_settings(&settings).unwrap_err();
        assert!(err.to_string().contains("sample rate"));
    }

    #[test]
    fn test_validate_unknown_ffmpeg_log_level_fails() {
        let mut settings = Settings::default();
        settings.ffmpeg.log_level = "loud".to_string();
        assert!(validate_settings(&settings).is_err());
    }
}
