//! Terminal results of a run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// What one volume produced in a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeOutcome {
    pub output_path: PathBuf,
    /// Encoded output duration in milliseconds.
    pub duration_ms: u64,
    pub files_converted: usize,
    pub files_failed: usize,
}

/// Why a run produced no output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// A volume could not be bound at all: bad configuration, no input files,
    /// or the container could not be created or closed.
    Structural { volume: String, reason: String },
    /// The error policy stopped a volume after a file failure.
    Rejected { volume: String },
    /// The run was cancelled.
    Cancelled,
    /// No file converted anywhere in the run.
    NothingConverted,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Structural { volume, reason } => write!(f, "{}: {}", volume, reason),
            FailureReason::Rejected { volume } => {
                write!(f, "{}: stopped after a file failed to convert", volume)
            }
            FailureReason::Cancelled => write!(f, "cancelled"),
            FailureReason::NothingConverted => write!(f, "no files converted"),
        }
    }
}

/// Outcome of [`AudioBinder::bind`](crate::binder::AudioBinder::bind).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum BindResult {
    /// Every volume was written.
    Success {
        total_duration_ms: u64,
        volumes: Vec<VolumeOutcome>,
    },
    /// Nothing was kept; every output created by the run was deleted.
    Failure { reason: FailureReason },
}

impl BindResult {
    pub fn failure(reason: FailureReason) -> Self {
        BindResult::Failure { reason }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BindResult::Success { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            BindResult::Failure {
                reason: FailureReason::Cancelled
            }
        )
    }

    /// Total duration, for successful runs.
    pub fn total_duration_ms(&self) -> Option<u64> {
        match self {
            BindResult::Success {
                total_duration_ms, ..
            } => Some(*total_duration_ms),
            BindResult::Failure { .. } => None,
        }
    }

    pub fn failure_reason(&self) -> Option<&FailureReason> {
        match self {
            BindResult::Success { .. } => None,
            BindResult::Failure { reason } => Some(reason),
        }
    }

    /// Metric label for this outcome.
    pub fn label(&self) -> &'static str {
        match self {
            BindResult::Success { .. } => "success",
            BindResult::Failure {
                reason: FailureReason::Cancelled,
            } => "cancelled",
            BindResult::Failure { .. } => "failure",
        }
    }
}
