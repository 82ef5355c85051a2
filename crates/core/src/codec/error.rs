//! Error types for the codec boundary.

use std::fmt::Display;
use std::io;
use thiserror::Error;

use super::status::StatusCode;

/// Errors raised while converting a single source file.
///
/// Every variant carries a resolved diagnostic meant for direct display.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    /// The source or output could not be opened.
    #[error("can't open file: {0}")]
    FileOpen(String),

    /// The source has no decodable audio or an unusable layout.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The codec refused a format, channel map, or bitrate setting.
    #[error("property rejected: {0}")]
    PropertyRejected(String),

    /// Reading, writing, or finalising the stream failed.
    #[error("I/O failed: {0}")]
    Io(String),

    /// The run was cancelled.
    #[error("conversion cancelled")]
    Cancelled,
}

impl ConversionError {
    /// Creates a file-open error from an I/O error.
    pub fn file_open(context: impl Display, error: &io::Error) -> Self {
        Self::FileOpen(format!("{}: {}", context, describe_io(error)))
    }

    /// Creates an I/O error from an `std::io::Error`.
    pub fn io(context: impl Display, error: &io::Error) -> Self {
        Self::Io(format!("{}: {}", context, describe_io(error)))
    }

    /// Creates a property-rejected error.
    pub fn property_rejected(reason: impl Into<String>) -> Self {
        Self::PropertyRejected(reason.into())
    }

    /// Creates an unsupported-format error.
    pub fn unsupported_format(reason: impl Into<String>) -> Self {
        Self::UnsupportedFormat(reason.into())
    }

    /// Whether this error is the cancellation marker rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Renders an I/O error through the status table when it carries an OS code.
pub(crate) fn describe_io(error: &io::Error) -> String {
    match error.raw_os_error() {
        Some(code) => StatusCode(code).describe(),
        None => error.to_string(),
    }
}
