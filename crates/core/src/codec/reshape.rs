//! Channel layout reshaping for canonical PCM buffers.

use super::types::CANONICAL_BITS_PER_SAMPLE;

const SAMPLE_BYTES: usize = (CANONICAL_BITS_PER_SAMPLE / 8) as usize;

/// Maps each output channel to a source channel index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMap {
    source_channels: u16,
    sources: Vec<usize>,
}

impl ChannelMap {
    /// Creates a map from `source_channels` inputs to `sources.len()` outputs.
    ///
    /// Returns `None` if any index is out of range or the map is empty.
    pub fn new(source_channels: u16, sources: Vec<usize>) -> Option<Self> {
        if sources.is_empty() || sources.iter().any(|&s| s >= usize::from(source_channels)) {
            return None;
        }
        Some(Self {
            source_channels,
            sources,
        })
    }

    /// The map needed between a source layout and a target layout, if any.
    ///
    /// Mono sources bound to a stereo target duplicate the single channel
    /// into both outputs. Every other combination is left to the decoder.
    pub fn for_formats(source_channels: u16, target_channels: u16) -> Option<Self> {
        match (source_channels, target_channels) {
            (1, 2) => Self::new(1, vec![0, 0]),
            _ => None,
        }
    }

    pub fn source_channels(&self) -> u16 {
        self.source_channels
    }

    pub fn output_channels(&self) -> u16 {
        self.sources.len() as u16
    }

    /// Copies `frames` frames from `src` into `dst`, rearranging channels.
    ///
    /// Samples are copied byte for byte, so duplicated channels are
    /// bit-identical. Frames that do not fit either buffer are ignored.
    pub fn remap(&self, src: &[u8], frames: usize, dst: &mut [u8]) -> usize {
        let src_frame = usize::from(self.source_channels) * SAMPLE_BYTES;
        let dst_frame = self.sources.len() * SAMPLE_BYTES;
        let frames = frames.min(src.len() / src_frame).min(dst.len() / dst_frame);

        for (in_frame, out_frame) in src
            .chunks_exact(src_frame)
            .zip(dst.chunks_exact_mut(dst_frame))
            .take(frames)
        {
            for (out_sample, &source) in out_frame
                .chunks_exact_mut(SAMPLE_BYTES)
                .zip(self.sources.iter())
            {
                let start = source * SAMPLE_BYTES;
                out_sample.copy_from_slice(&in_frame[start..start + SAMPLE_BYTES]);
            }
        }

        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mono_to_stereo_map() {
        let map = ChannelMap::for_formats(1, 2).unwrap();
        assert_eq!(map.source_channels(), 1);
        assert_eq!(map.output_channels(), 2);
    }

    #[test]
    fn test_no_map_for_matching_or_downmix_layouts() {
        assert!(ChannelMap::for_formats(2, 2).is_none());
        assert!(ChannelMap::for_formats(1, 1).is_none());
        assert!(ChannelMap::for_formats(2, 1).is_none());
        assert!(ChannelMap::for_formats(6, 2).is_none());
    }

    #[test]
    fn test_out_of_range_source_rejected() {
        assert!(ChannelMap::new(1, vec![0, 1]).is_none());
        assert!(ChannelMap::new(2, vec![]).is_none());
    }

    #[test]
    fn test_remap_duplicates_samples_exactly() {
        let map = ChannelMap::for_formats(1, 2).unwrap();
        let src = [0x12, 0x34, 0x80, 0x00, 0xFF, 0xFF];
        let mut dst = [0u8; 12];

        let frames = map.remap(&src, 3, &mut dst);

        assert_eq!(frames, 3);
        assert_eq!(
            dst,
            [0x12, 0x34, 0x12, 0x34, 0x80, 0x00, 0x80, 0x00, 0xFF, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn test_remap_swaps_channels() {
        let map = ChannelMap::new(2, vec![1, 0]).unwrap();
        let src = [0x00, 0x01, 0x00, 0x02];
        let mut dst = [0u8; 4];
        map.remap(&src, 1, &mut dst);
        assert_eq!(dst, [0x00, 0x02, 0x00, 0x01]);
    }

    #[test]
    fn test_remap_clamps_to_buffer_sizes() {
        let map = ChannelMap::for_formats(1, 2).unwrap();
        let src = [0u8; 8];
        let mut dst = [0u8; 8];
        assert_eq!(map.remap(&src, 10, &mut dst), 2);
    }
}
