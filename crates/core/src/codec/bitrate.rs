//! Valid AAC encoder bitrates.

/// Constant bitrates offered by AAC-LC encoders, in bits per second.
const AAC_BITRATES: &[u32] = &[
    8_000, 12_000, 16_000, 20_000, 24_000, 28_000, 32_000, 40_000, 48_000, 56_000, 64_000,
    80_000, 96_000, 112_000, 128_000, 144_000, 160_000, 192_000, 224_000, 256_000, 288_000,
    320_000,
];

/// Bitrates usable for the given sample rate and channel count.
///
/// The ceiling is the AAC limit of 6144 bits per 1024-frame block per channel.
/// The floor is 8 kbit/s per channel below 32 kHz and 16 kbit/s per channel
/// at or above it.
pub fn valid_bitrates(sample_rate: u32, channels: u16) -> Vec<u32> {
    if sample_rate == 0 || channels == 0 {
        return Vec::new();
    }

    let channels = u64::from(channels);
    let max = u64::from(sample_rate) * 6 * channels;
    let per_channel_min = if sample_rate >= 32_000 { 16_000 } else { 8_000 };
    let min = per_channel_min * channels;

    AAC_BITRATES
        .iter()
        .copied()
        .filter(|&rate| u64::from(rate) >= min && u64::from(rate) <= max)
        .collect()
}

/// Snaps `bitrate` to the closest valid bitrate.
///
/// Zero (codec default) stays zero. A candidate must be closer than
/// `bitrate` itself; when none is, the codec default is returned. Ties resolve
/// to the lower bitrate.
pub fn nearest_valid_bitrate(bitrate: u32, sample_rate: u32, channels: u16) -> u32 {
    if bitrate == 0 {
        return 0;
    }

    let mut best = 0;
    let mut distance = bitrate;
    for candidate in valid_bitrates(sample_rate, channels) {
        let d = candidate.abs_diff(bitrate);
        if d < distance {
            distance = d;
            best = candidate;
        }
    }
    best
}
