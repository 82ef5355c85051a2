//! Capabilities the engine consults while a run is in progress.
//!
//! Both are called synchronously from the thread running
//! [`AudioBinder::bind`](super::AudioBinder::bind), never concurrently.

use tracing::{debug, info, warn};

use crate::codec::NativeFormat;
use crate::probe::SourceFile;

/// Decides whether a volume keeps going after one of its files fails.
pub trait ErrorPolicy {
    /// Returns `true` to skip `file` and continue with the next one, `false`
    /// to stop the volume, which fails the run.
    fn continue_after(&mut self, file: &SourceFile, reason: &str) -> bool;
}

impl<F> ErrorPolicy for F
where
    F: FnMut(&SourceFile, &str) -> bool,
{
    fn continue_after(&mut self, file: &SourceFile, reason: &str) -> bool {
        self(file, reason)
    }
}

/// Skips every failed file.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipFailed;

impl ErrorPolicy for SkipFailed {
    fn continue_after(&mut self, _file: &SourceFile, _reason: &str) -> bool {
        true
    }
}

/// Stops at the first failed file.
#[derive(Debug, Clone, Copy, Default)]
pub struct AbortOnFailure;

impl ErrorPolicy for AbortOnFailure {
    fn continue_after(&mut self, _file: &SourceFile, _reason: &str) -> bool {
        false
    }
}

/// Receives progress events in run order.
///
/// Every method has an empty default so implementations only pick the events
/// they care about.
pub trait ProgressReporter {
    /// A file is about to be converted. `frames_total` is expressed at the
    /// output sample rate.
    fn conversion_start(&mut self, _file: &SourceFile, _format: &NativeFormat, _frames_total: u64) {}

    /// Emitted after every chunk written; zero or more times per file.
    fn update_status(&mut self, _file: &SourceFile, _frames_done: u64, _frames_total: u64) {}

    fn file_done(&mut self, _file: &SourceFile, _duration_ms: u64) {}

    /// A volume could not be bound. The run fails.
    fn volume_failed(&mut self, _name: &str, _reason: &str) {}

    fn volume_done(&mut self, _name: &str, _duration_ms: u64) {}

    /// Every volume was written. Emitted once, last.
    fn book_done(&mut self, _total_duration_ms: u64) {}
}

/// Ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl ProgressReporter for NullReporter {}

/// Logs progress events through `tracing`.
///
/// Status updates are logged at debug level each time a file crosses another
/// tenth of its length.
#[derive(Debug, Default)]
pub struct TracingReporter {
    last_decile: u64,
}

impl TracingReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressReporter for TracingReporter {
    fn conversion_start(&mut self, file: &SourceFile, format: &NativeFormat, frames_total: u64) {
        self.last_decile = 0;
        info!(
            "Converting {} ({}, {} Hz, {} ch, {} frames)",
            file.file_name(),
            format.description,
            format.sample_rate,
            format.channels,
            frames_total
        );
    }

    fn update_status(&mut self, file: &SourceFile, frames_done: u64, frames_total: u64) {
        if frames_total == 0 {
            return;
        }
        let decile = (u128::from(frames_done) * 10 / u128::from(frames_total)).min(10) as u64;
        if decile > self.last_decile {
            self.last_decile = decile;
            debug!("{}: {}%", file.file_name(), decile * 10);
        }
    }

    fn file_done(&mut self, file: &SourceFile, duration_ms: u64) {
        info!("Converted {} ({} ms)", file.file_name(), duration_ms);
    }

    fn volume_failed(&mut self, name: &str, reason: &str) {
        warn!("Volume {} failed: {}", name, reason);
    }

    fn volume_done(&mut self, name: &str, duration_ms: u64) {
        info!("Volume {} done ({} ms)", name, duration_ms);
    }

    fn book_done(&mut self, total_duration_ms: u64) {
        info!("Audiobook done ({} ms)", total_duration_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_policy() {
        let mut seen = Vec::new();
        let mut policy = |file: &SourceFile, reason: &str| {
            seen.push((file.file_name(), reason.to_string()));
            file.file_name() != "fatal.mp3"
        };

        assert!(policy.continue_after(&SourceFile::unprobed("/a/ok.mp3"), "bad data"));
        assert!(!policy.continue_after(&SourceFile::unprobed("/a/fatal.mp3"), "bad data"));
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], ("ok.mp3".to_string(), "bad data".to_string()));
    }

    #[test]
    fn test_provided_policies() {
        let file = SourceFile::unprobed("/a.mp3");
        assert!(SkipFailed.continue_after(&file, "x"));
        assert!(!AbortOnFailure.continue_after(&file, "x"));

        let policy: &mut dyn ErrorPolicy = &mut SkipFailed;
        assert!(policy.continue_after(&file, "x"));
    }

    #[test]
    fn test_tracing_reporter_tracks_deciles() {
        let file = SourceFile::with_duration("/a.mp3", 1000);
        let format = NativeFormat {
            sample_rate: 44100,
            channels: 2,
            total_frames: 100,
            description: "test".to_string(),
        };
        let mut reporter = TracingReporter::new();

        reporter.conversion_start(&file, &format, 100);
        reporter.update_status(&file, 25, 100);
        assert_eq!(reporter.last_decile, 2);
        reporter.update_status(&file, 29, 100);
        assert_eq!(reporter.last_decile, 2);
        reporter.update_status(&file, 150, 100);
        assert_eq!(reporter.last_decile, 10);

        reporter.conversion_start(&file, &format, 100);
        assert_eq!(reporter.last_decile, 0);
    }
}
