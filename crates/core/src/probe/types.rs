//! Types for the probe module.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A source audio file with its probed duration and tags.
///
/// Produced by a [`Prober`](super::Prober) when a file is added to a plan.
/// The engine only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Path to the audio file.
    pub path: PathBuf,
    /// Estimated duration in milliseconds, or -1 when unknown.
    pub duration_ms: i64,
    /// Whether the file could be opened and holds an audio stream.
    pub valid: bool,
    /// Artist tag, empty when absent.
    #[serde(default)]
    pub artist: String,
    /// Title tag, empty when absent.
    #[serde(default)]
    pub title: String,
    /// Album tag, empty when absent.
    #[serde(default)]
    pub album: String,
}

impl SourceFile {
    /// Duration value for files whose length is unknown.
    pub const UNKNOWN_DURATION: i64 = -1;

    /// The result for a file that could not be probed.
    pub fn unprobed(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            duration_ms: Self::UNKNOWN_DURATION,
            valid: false,
            artist: String::new(),
            title: String::new(),
            album: String::new(),
        }
    }

    /// A valid file with a known duration and no tags.
    pub fn with_duration(path: impl Into<PathBuf>, duration_ms: i64) -> Self {
        Self {
            duration_ms,
            valid: true,
            ..Self::unprobed(path)
        }
    }

    /// The last path component, for display.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the probe reported a duration.
    pub fn has_known_duration(&self) -> bool {
        self.duration_ms >= 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unprobed_defaults() {
        let file = SourceFile::unprobed("/books/missing.mp3");
        assert!(!file.valid);
        assert_eq!(file.duration_ms, -1);
        assert!(!file.has_known_duration());
        assert_eq!(file.artist, "");
        assert_eq!(file.title, "");
        assert_eq!(file.album, "");
    }

    #[test]
    fn test_file_name() {
        let file = SourceFile::with_duration("/books/part 01.mp3", 1000);
        assert_eq!(file.file_name(), "part 01.mp3");
        assert!(file.valid);
    }

    #[test]
    fn test_serialization_fills_missing_tags() {
        let file: SourceFile =
            serde_json::from_str(r#"{"path":"/a.mp3","duration_ms":5000,"valid":true}"#).unwrap();
        assert_eq!(file.duration_ms, 5000);
        assert_eq!(file.artist, "");
    }
}
