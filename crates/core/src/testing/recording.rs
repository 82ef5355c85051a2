//! Recording observers for testing.

use std::collections::VecDeque;
use std::path::PathBuf;

use crate::binder::{CancelHandle, ErrorPolicy, ProgressReporter};
use crate::codec::NativeFormat;
use crate::probe::SourceFile;

/// A progress event as received by [`RecordingReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    ConversionStart {
        file: PathBuf,
        frames_total: u64,
    },
    UpdateStatus {
        file: PathBuf,
        frames_done: u64,
        frames_total: u64,
    },
    FileDone {
        file: PathBuf,
        duration_ms: u64,
    },
    VolumeFailed {
        name: String,
        reason: String,
    },
    VolumeDone {
        name: String,
        duration_ms: u64,
    },
    BookDone {
        total_duration_ms: u64,
    },
}

/// Progress reporter that records every event in order.
///
/// It can also cancel the run once a file has converted a given number of
/// frames, which exercises cancellation at a precise point.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Vec<ProgressEvent>,
    cancel_after: Option<(u64, CancelHandle)>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels through `handle` once the current file reaches `frames` frames.
    pub fn cancel_after_frames(mut self, frames: u64, handle: CancelHandle) -> Self {
        self.cancel_after = Some((frames, handle));
        self
    }

    pub fn events(&self) -> &[ProgressEvent] {
        &self.events
    }

    /// Target-rate frame totals announced by `conversion_start`, in order.
    pub fn conversion_totals(&self) -> Vec<u64> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::ConversionStart { frames_total, .. } => Some(*frames_total),
                _ => None,
            })
            .collect()
    }

    pub fn files_done(&self) -> Vec<(PathBuf, u64)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::FileDone { file, duration_ms } => Some((file.clone(), *duration_ms)),
                _ => None,
            })
            .collect()
    }

    pub fn volume_failures(&self) -> Vec<(String, String)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::VolumeFailed { name, reason } => Some((name.clone(), reason.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn volumes_done(&self) -> Vec<(String, u64)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::VolumeDone { name, duration_ms } => Some((name.clone(), *duration_ms)),
                _ => None,
            })
            .collect()
    }

    pub fn books_done(&self) -> Vec<u64> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::BookDone { total_duration_ms } => Some(*total_duration_ms),
                _ => None,
            })
            .collect()
    }

    pub fn status_updates(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, ProgressEvent::UpdateStatus { .. }))
            .count()
    }
}

impl ProgressReporter for RecordingReporter {
    fn conversion_start(&mut self, file: &SourceFile, _format: &NativeFormat, frames_total: u64) {
        self.events.push(ProgressEvent::ConversionStart {
            file: file.path.clone(),
            frames_total,
        });
    }

    fn update_status(&mut self, file: &SourceFile, frames_done: u64, frames_total: u64) {
        self.events.push(ProgressEvent::UpdateStatus {
            file: file.path.clone(),
            frames_done,
            frames_total,
        });

        if let Some((threshold, _)) = &self.cancel_after {
            if frames_done >= *threshold {
                if let Some((_, handle)) = self.cancel_after.take() {
                    handle.cancel();
                }
            }
        }
    }

    fn file_done(&mut self, file: &SourceFile, duration_ms: u64) {
        self.events.push(ProgressEvent::FileDone {
            file: file.path.clone(),
            duration_ms,
        });
    }

    fn volume_failed(&mut self, name: &str, reason: &str) {
        self.events.push(ProgressEvent::VolumeFailed {
            name: name.to_string(),
            reason: reason.to_string(),
        });
    }

    fn volume_done(&mut self, name: &str, duration_ms: u64) {
        self.events.push(ProgressEvent::VolumeDone {
            name: name.to_string(),
            duration_ms,
        });
    }

    fn book_done(&mut self, total_duration_ms: u64) {
        self.events.push(ProgressEvent::BookDone { total_duration_ms });
    }
}

/// Error policy that answers from a script and records every call.
#[derive(Debug, Default)]
pub struct ScriptedPolicy {
    answers: VecDeque<bool>,
    fallback: bool,
    calls: Vec<(PathBuf, String)>,
}

impl ScriptedPolicy {
    /// Answers `answers` in order, then `fallback` for every later call.
    pub fn new(answers: impl IntoIterator<Item = bool>, fallback: bool) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            fallback,
            calls: Vec::new(),
        }
    }

    /// Always gives the same answer.
    pub fn always(answer: bool) -> Self {
        Self::new([], answer)
    }

    /// Files and reasons the engine reported, in order.
    pub fn calls(&self) -> &[(PathBuf, String)] {
        &self.calls
    }
}

impl ErrorPolicy for ScriptedPolicy {
    fn continue_after(&mut self, file: &SourceFile, reason: &str) -> bool {
        self.calls.push((file.path.clone(), reason.to_string()));
        self.answers.pop_front().unwrap_or(self.fallback)
    }
}
