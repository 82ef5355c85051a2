//! Codec boundary for decoding sources and encoding volumes.
//!
//! The engine talks to audio codecs only through the traits in this module:
//! an [`AudioCodec`] opens [`SourceDecoder`]s on input files and
//! [`OutputContainer`]s for volumes. Samples cross the boundary as signed
//! 16-bit big-endian packed PCM at the run's target rate.
//!
//! # Example
//!
//! ```ignore
//! use audiobinder_core::codec::{AudioCodec, FfmpegCodec, OutputFormat, SourceDecoder};
//!
//! let codec = FfmpegCodec::with_defaults();
//! codec.validate()?;
//!
//! let decoder = codec.open_decoder(Path::new("/books/part1.mp3"))?;
//! println!("{} frames", decoder.native_format().total_frames);
//!
//! let container = codec.create_container(Path::new("/out/book.m4b"), &OutputFormat::new(44100, 2))?;
//! ```

mod bitrate;
mod config;
mod error;
mod ffmpeg;
mod reshape;
mod status;
mod traits;
mod types;

pub use bitrate::{nearest_valid_bitrate, valid_bitrates};
pub use config::FfmpegConfig;
pub use error::ConversionError;
pub use ffmpeg::{FfmpegCodec, FfmpegContainer, FfmpegDecoder};
pub use reshape::ChannelMap;
pub use status::StatusCode;
pub use traits::{AudioCodec, OutputContainer, SourceDecoder};
pub use types::{
    frames_to_ms, ByteOrder, NativeFormat, OutputFormat, PcmFormat, CANONICAL_BITS_PER_SAMPLE,
};
