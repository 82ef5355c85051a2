//! Trait definitions for the codec boundary.
//!
//! The conversion engine never links against a codec directly. It opens
//! decoders and output containers through these capabilities, so any backend
//! that can stream PCM in and out can drive a run.

use std::path::Path;

use super::error::ConversionError;
use super::types::{NativeFormat, OutputFormat, PcmFormat};

/// A codec backend that opens streaming decoders and output containers.
pub trait AudioCodec: Send + Sync {
    /// Streaming decoder for one source file.
    type Decoder: SourceDecoder;
    /// Encoder + muxer for one output file.
    type Container: OutputContainer;

    /// Returns the name of this codec implementation.
    fn name(&self) -> &str;

    /// Opens a streaming decoder on a source file.
    fn open_decoder(&self, path: &Path) -> Result<Self::Decoder, ConversionError>;

    /// Creates an output container, erasing any file already at `path`.
    fn create_container(
        &self,
        path: &Path,
        format: &OutputFormat,
    ) -> Result<Self::Container, ConversionError>;
}

/// A streaming decoder that delivers PCM in a caller-chosen client format.
pub trait SourceDecoder {
    /// The file's native format and frame count.
    fn native_format(&self) -> &NativeFormat;

    /// Sets the PCM format `read_frames` delivers.
    ///
    /// Must be called before the first read.
    fn set_client_format(&mut self, format: &PcmFormat) -> Result<(), ConversionError>;

    /// Reads up to `buf.len() / bytes_per_frame` frames into `buf`.
    ///
    /// Returns the number of whole frames written. Zero means end of stream.
    fn read_frames(&mut self, buf: &mut [u8]) -> Result<usize, ConversionError>;
}

/// An output container fed with PCM in the canonical format.
pub trait OutputContainer {
    /// Sets the PCM format accepted by `write_frames`.
    fn set_client_format(&mut self, format: &PcmFormat) -> Result<(), ConversionError>;

    /// Sets the encoder bitrate in bits per second. Only valid before the first write.
    fn set_bitrate(&mut self, bits_per_second: u32) -> Result<(), ConversionError>;

    /// Encodes `frames` frames from the start of `buf`.
    fn write_frames(&mut self, buf: &[u8], frames: usize) -> Result<(), ConversionError>;

    /// Total frames encoded into this container so far.
    fn tell(&self) -> Result<u64, ConversionError>;

    /// Finalises the container.
    ///
    /// Consumes the container, so it runs at most once. Implementations release
    /// their resources on drop when `close` is never reached.
    fn close(self) -> Result<(), ConversionError>;
}
