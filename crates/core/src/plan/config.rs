//! Per-run output configuration.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::codec::{nearest_valid_bitrate, OutputFormat};

use super::error::PlanError;

/// Output channel layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Channels {
    Mono,
    Stereo,
}

impl Channels {
    pub fn count(self) -> u16 {
        match self {
            Channels::Mono => 1,
            Channels::Stereo => 2,
        }
    }
}

impl TryFrom<u16> for Channels {
    type Error = PlanError;

    fn try_from(count: u16) -> Result<Self, Self::Error> {
        match count {
            1 => Ok(Channels::Mono),
            2 => Ok(Channels::Stereo),
            other => Err(PlanError::UnsupportedChannels(other)),
        }
    }
}

impl From<Channels> for u16 {
    fn from(channels: Channels) -> Self {
        channels.count()
    }
}

impl fmt::Display for Channels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channels::Mono => write!(f, "mono"),
            Channels::Stereo => write!(f, "stereo"),
        }
    }
}

/// Output settings for one `bind` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Output channel layout.
    #[serde(default = "default_channels")]
    pub channels: Channels,
    /// Output sample rate in Hz.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Encoder bitrate in bits per second, 0 for the codec default.
    #[serde(default)]
    pub bitrate: u32,
}

fn default_channels() -> Channels {
    Channels::Stereo
}

fn default_sample_rate() -> u32 {
    44100
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            channels: default_channels(),
            sample_rate: default_sample_rate(),
            bitrate: 0,
        }
    }
}

impl RunConfig {
    pub fn new(channels: Channels, sample_rate: u32, bitrate: u32) -> Self {
        Self {
            channels,
            sample_rate,
            bitrate,
        }
    }

    pub fn validate(&self) -> Result<(), PlanError> {
        if self.sample_rate == 0 {
            return Err(PlanError::InvalidRunConfig(
                "sample rate must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns a copy whose bitrate is snapped to the nearest value the
    /// AAC encoder accepts at this rate and layout. Zero stays zero.
    pub fn fixup_bitrate(&self) -> Self {
        Self {
            bitrate: nearest_valid_bitrate(self.bitrate, self.sample_rate, self.channels.count()),
            ..*self
        }
    }

    /// The shape of every container created for this run.
    pub fn output_format(&self) -> OutputFormat {
        OutputFormat::new(self.sample_rate, self.channels.count())
    }
}
