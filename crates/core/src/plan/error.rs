//! Errors raised while building a plan or run configuration.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    /// Two volumes target the same output file.
    #[error("duplicate output path: {}", path.display())]
    DuplicateOutput { path: PathBuf },

    /// The run configuration cannot drive an encoder.
    #[error("invalid run configuration: {0}")]
    InvalidRunConfig(String),

    /// The channel count is neither mono nor stereo.
    #[error("unsupported channel count: {0} (expected 1 or 2)")]
    UnsupportedChannels(u16),
}
