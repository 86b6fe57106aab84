//! Stream specifications shared by sources and sinks
//!
//! Samples always travel through the pipeline as interleaved 32-bit floats.
//! `SampleFormat` only describes how a sink encodes them (or how a source
//! decoded them) at the container boundary.

use serde::{Deserialize, Serialize};

use crate::error::{MixdownError, Result};

/// Encoded sample width at the container boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    /// Unsigned 8-bit integer
    U8,
    /// Signed 16-bit integer
    S16,
    /// Signed 24-bit integer
    #[default]
    S24,
    /// Signed 32-bit integer
    S32,
    /// 32-bit float
    F32,
}

impl SampleFormat {
    /// Width of one encoded sample in bytes
    pub fn width_bytes(&self) -> usize {
        match self {
            SampleFormat::U8 => 1,
            SampleFormat::S16 => 2,
            SampleFormat::S24 => 3,
            SampleFormat::S32 | SampleFormat::F32 => 4,
        }
    }

    /// Bit depth as stored in a WAV header
    pub fn bits(&self) -> u16 {
        (self.width_bytes() * 8) as u16
    }

    /// Whether samples are stored as IEEE floats
    pub fn is_float(&self) -> bool {
        matches!(self, SampleFormat::F32)
    }

    /// Map a bit depth and float flag to a format
    pub fn from_bits(bits: u16, is_float: bool) -> Result<Self> {
        match (bits, is_float) {
            (8, false) => Ok(SampleFormat::U8),
            (16, false) => Ok(SampleFormat::S16),
            (24, false) => Ok(SampleFormat::S24),
            (32, false) => Ok(SampleFormat::S32),
            (32, true) => Ok(SampleFormat::F32),
            _ => Err(MixdownError::UnsupportedFormat {
                format: format!(
                    "{}-bit {} audio",
                    bits,
                    if is_float { "float" } else { "integer" }
                ),
            }),
        }
    }

    /// Format used for a CLI `--bit-depth` value (32 means float)
    pub fn for_bit_depth(bits: u16) -> Result<Self> {
        match bits {
            16 => Ok(SampleFormat::S16),
            24 => Ok(SampleFormat::S24),
            32 => Ok(SampleFormat::F32),
            _ => Err(MixdownError::UnsupportedFormat {
                format: format!("{}-bit audio (only 16, 24, 32 supported)", bits),
            }),
        }
    }
}

/// Channel count, sample rate and sample width of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamSpec {
    pub channels: u16,
    pub sample_rate: u32,
    pub format: SampleFormat,
}

impl StreamSpec {
    pub fn new(channels: u16, sample_rate: u32, format: SampleFormat) -> Self {
        Self {
            channels,
            sample_rate,
            format,
        }
    }

    /// The same stream with a single channel, as used by fan-out sinks
    pub fn mono(&self) -> Self {
        Self {
            channels: 1,
            ..*self
        }
    }

    /// Channel count as an index bound
    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channels as usize
    }

    /// In-memory size of one interleaved frame of `f32` samples
    #[inline]
    pub fn frame_bytes(&self) -> usize {
        self.channel_count() * std::mem::size_of::<f32>()
    }
}
