//! Sample formats exchanged across the codec boundary.

use serde::{Deserialize, Serialize};

/// Bit depth of the canonical intermediate format.
pub const CANONICAL_BITS_PER_SAMPLE: u16 = 16;

/// Byte order of PCM samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    BigEndian,
    LittleEndian,
}

/// Description of an interleaved linear PCM stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcmFormat {
    /// Frames per second.
    pub sample_rate: u32,
    /// Interleaved channels per frame.
    pub channels: u16,
    /// Bits per sample.
    pub bits_per_sample: u16,
    /// Sample byte order.
    pub byte_order: ByteOrder,
    /// Whether samples are signed integers.
    pub signed: bool,
    /// Whether samples are packed without padding.
    pub packed: bool,
}

impl PcmFormat {
    /// The canonical intermediate format: signed 16-bit big-endian packed PCM.
    pub fn canonical(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample: CANONICAL_BITS_PER_SAMPLE,
            byte_order: ByteOrder::BigEndian,
            signed: true,
            packed: true,
        }
    }

    /// Returns the same format with a different channel count.
    pub fn with_channels(self, channels: u16) -> Self {
        Self { channels, ..self }
    }

    /// Bytes occupied by one sample of one channel.
    pub fn bytes_per_sample(&self) -> usize {
        usize::from(self.bits_per_sample / 8)
    }

    /// Bytes occupied by one interleaved frame.
    pub fn bytes_per_frame(&self) -> usize {
        usize::from(self.channels) * self.bytes_per_sample()
    }

    /// Whether this is the canonical representation at some rate and channel count.
    pub fn is_canonical(&self) -> bool {
        self.bits_per_sample == CANONICAL_BITS_PER_SAMPLE
            && self.byte_order == ByteOrder::BigEndian
            && self.signed
            && self.packed
            && self.channels > 0
            && self.sample_rate > 0
    }
}

/// The native format of a source file, as reported by the decoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeFormat {
    /// Native sample rate in Hz.
    pub sample_rate: u32,
    /// Native channel count.
    pub channels: u16,
    /// Total frames at the native sample rate.
    pub total_frames: u64,
    /// Human-readable codec/format name.
    pub description: String,
}

impl NativeFormat {
    /// Converts the native frame total to the given sample rate.
    ///
    /// Returns `None` when the native rate is unknown (zero).
    pub fn frames_at_rate(&self, target_rate: u32) -> Option<u64> {
        if self.sample_rate == 0 {
            return None;
        }
        let frames =
            u128::from(self.total_frames) * u128::from(target_rate) / u128::from(self.sample_rate);
        Some(u64::try_from(frames).unwrap_or(u64::MAX))
    }
}

/// Shape of an output container: AAC audio in an MPEG-4 container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFormat {
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Output channel count.
    pub channels: u16,
}

impl OutputFormat {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// The canonical PCM format the encoder accepts for this output.
    pub fn client_format(&self) -> PcmFormat {
        PcmFormat::canonical(self.sample_rate, self.channels)
    }
}

/// Converts a frame count at `sample_rate` to rounded milliseconds.
pub fn frames_to_ms(frames: u64, sample_rate: u32) -> u64 {
    if sample_rate == 0 {
        return 0;
    }
    let rate = u128::from(sample_rate);
    let ms = (u128::from(frames) * 1000 + rate / 2) / rate;
    u64::try_from(ms).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_format_layout() {
        let format = PcmFormat::canonical(44100, 2);
        assert!(format.is_canonical());
        assert_eq!(format.bytes_per_sample(), 2);
        assert_eq!(format.bytes_per_frame(), 4);
        assert_eq!(format.with_channels(1).bytes_per_frame(), 2);
    }

    #[test]
    fn test_little_endian_is_not_canonical() {
        let format = PcmFormat {
            byte_order: ByteOrder::LittleEndian,
            ..PcmFormat::canonical(44100, 2)
        };
        assert!(!format.is_canonical());
    }

    #[test]
    fn test_frames_at_rate_scales_to_target() {
        let native = NativeFormat {
            sample_rate: 48000,
            channels: 2,
            total_frames: 480_000,
            description: "AAC".to_string(),
        };
        assert_eq!(native.frames_at_rate(44100), Some(441_000));
        assert_eq!(native.frames_at_rate(48000), Some(480_000));
    }

    #[test]
    fn test_frames_at_rate_unknown_native_rate() {
        let native = NativeFormat {
            sample_rate: 0,
            channels: 1,
            total_frames: 100,
            description: String::new(),
        };
        assert_eq!(native.frames_at_rate(44100), None);
    }

    #[test]
    fn test_frames_to_ms_rounds() {
        assert_eq!(frames_to_ms(220_500, 44100), 5000);
        assert_eq!(frames_to_ms(22, 44100), 0);
        assert_eq!(frames_to_ms(23, 44100), 1);
        assert_eq!(frames_to_ms(1000, 0), 0);
    }
}
