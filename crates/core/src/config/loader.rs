use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Settings, ConfigError};

/// Prefix of environment variables that override settings.
pub const ENV_PREFIX: &str = "AUDIOBINDER_";

/// Load settings from file with environment variable overrides
///
/// Nested keys are separated by a double underscore, e.g.
/// `AUDIOBINDER_FFMPEG__LOG_LEVEL=debug`.
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load default settings with environment variable overrides only
pub fn load_settings_from_env() -> Result<Settings, ConfigError> {
    Figment::from(Serialized::defaults(Settings::default()))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load settings from TOML string (useful for testing)
pub fn load_settings_from_str(toml_str: &str) -> Result<Settings, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Channels;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_settings_from_str_empty_uses_defaults() {
        let settings = load_settings_from_str("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.engine.buffer_size_bytes, 1024 * 1024);
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn test_load_settings_from_str_valid() {
        let toml = r#"
[ffmpeg]
ffmpeg_path = "/opt/ffmpeg/bin/ffmpeg"
log_level = "warning"

[run]
channels = 1
sample_rate = 22050
bitrate = 32000
"#;
        let settings = load_settings_from_str(toml).unwrap();
        assert_eq!(settings.ffmpeg.ffmpeg_path, PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
        assert_eq!(settings.ffmpeg.ffprobe_path, PathBuf::from("ffprobe"));
        assert_eq!(settings.ffmpeg.log_level, "warning");
        assert_eq!(settings.run.channels, Channels::Mono);
        assert_eq!(settings.run.sample_rate, 22050);
    }

    #[test]
    fn test_load_settings_from_str_bad_channels() {
        let result = load_settings_from_str("[run]\nchannels = 5\n");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_settings_file_not_found() {
        let result = load_settings(Path::new("/nonexistent/audiobinder.toml"));
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_load_settings_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[engine]
buffer_size_bytes = 65536

[logging]
level = "debug"
json = true
"#
        )
        .unwrap();

        let settings = load_settings(temp_file.path()).unwrap();
        assert_eq!(settings.engine.buffer_size_bytes, 65536);
        assert_eq!(settings.logging.level, "debug");
        assert!(settings.logging.json);
    }
}
