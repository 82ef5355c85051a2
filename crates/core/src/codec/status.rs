//! Status code descriptions for codec diagnostics.

use std::fmt;

/// A numeric status code reported by the codec layer.
///
/// Positive values are OS `errno` values. Negative values are ffmpeg
/// `AVERROR` codes, which are either a negated `errno` or a negated
/// four-character tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(pub i32);

/// Builds an ffmpeg `FFERRTAG` code.
const fn fferrtag(a: u8, b: u8, c: u8, d: u8) -> i32 {
    let tag = (a as u32) | ((b as u32) << 8) | ((c as u32) << 16) | ((d as u32) << 24);
    (tag as i32).wrapping_neg()
}

const KNOWN_CODES: &[(i32, &str)] = &[
    // errno
    (1, "Operation not permitted"),
    (2, "No such file or directory"),
    (5, "Input/output error"),
    (12, "Cannot allocate memory"),
    (13, "Permission denied"),
    (17, "File exists"),
    (20, "Not a directory"),
    (21, "Is a directory"),
    (22, "Invalid argument"),
    (24, "Too many open files"),
    (28, "No space left on device"),
    (30, "Read-only file system"),
    (32, "Broken pipe"),
    // AVERROR tags
    (fferrtag(0xF8, b'B', b'S', b'F'), "Bitstream filter not found"),
    (fferrtag(b'B', b'U', b'G', b'!'), "Internal bug"),
    (fferrtag(0xF8, b'D', b'E', b'C'), "Decoder not found"),
    (fferrtag(0xF8, b'D', b'E', b'M'), "Demuxer not found"),
    (fferrtag(0xF8, b'E', b'N', b'C'), "Encoder not found"),
    (fferrtag(b'E', b'O', b'F', b' '), "End of file"),
    (fferrtag(b'E', b'X', b'I', b'T'), "Immediate exit requested"),
    (fferrtag(b'I', b'N', b'D', b'A'), "Invalid data found when processing input"),
    (fferrtag(0xF8, b'M', b'U', b'X'), "Muxer not found"),
    (fferrtag(0xF8, b'O', b'P', b'T'), "Option not found"),
    (fferrtag(b'P', b'A', b'W', b'E'), "Not yet implemented in FFmpeg"),
    (fferrtag(0xF8, b'P', b'R', b'O'), "Protocol not found"),
    (fferrtag(0xF8, b'S', b'T', b'R'), "Stream not found"),
    (fferrtag(b'U', b'N', b'K', b'N'), "Unknown error"),
];

impl StatusCode {
    /// Looks up the description for this code.
    ///
    /// `AVERROR(errno)` values resolve through the `errno` entries.
    pub fn description(&self) -> Option<&'static str> {
        Self::lookup(self.0).or_else(|| {
            if self.0 < 0 {
                self.0.checked_neg().and_then(Self::lookup)
            } else {
                None
            }
        })
    }

    /// Renders the code as `err#<code> (<description>)`, or `err#<code>` when unknown.
    pub fn describe(&self) -> String {
        self.to_string()
    }

    fn lookup(code: i32) -> Option<&'static str> {
        KNOWN_CODES
            .iter()
            .find(|(known, _)| *known == code)
            .map(|(_, description)| *description)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.description() {
            Some(description) => write!(f, "err#{} ({})", self.0, description),
            None => write!(f, "err#{}", self.0),
        }
    }
}

impl From<i32> for StatusCode {
    fn from(code: i32) -> Self {
        Self(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_errno_is_described() {
        assert_eq!(StatusCode(2).to_string(), "err#2 (No such file or directory)");
        assert_eq!(StatusCode(13).to_string(), "err#13 (Permission denied)");
    }

    #[test]
    fn test_averror_errno_resolves_through_errno_table() {
        assert_eq!(StatusCode(-2).to_string(), "err#-2 (No such file or directory)");
    }

    #[test]
    fn test_averror_tag_is_described() {
        // AVERROR_INVALIDDATA
        let code = StatusCode(-1094995529);
        assert_eq!(
            code.description(),
            Some("Invalid data found when processing input")
        );

        // AVERROR_DECODER_NOT_FOUND
        assert_eq!(StatusCode(-1128613112).description(), Some("Decoder not found"));
    }

    #[test]
    fn test_unknown_code_falls_back_to_numeric_form() {
        assert_eq!(StatusCode(4242).to_string(), "err#4242");
        assert_eq!(StatusCode(-4242).to_string(), "err#-4242");
    }
}
