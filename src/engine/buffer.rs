//! Sample Buffer Management
//!
//! `SampleBuffer` is the scratch block a mixdown pass decodes into. It is
//! sized once, owned by a single pass and dropped when the pass ends.

use crate::error::{MixdownError, Result};

const SAMPLE_BYTES: usize = std::mem::size_of::<f32>();

// ============================================================================
// Clamping
// ============================================================================

/// Saturate a sample to the closed interval [-1.0, 1.0]
///
/// NaN has no ordering against the bounds and would otherwise pass through
/// untouched, so it is mapped to silence.
#[inline]
pub fn clamp_sample(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(-1.0, 1.0)
    }
}

/// Clamp every sample of `samples` in place
pub fn clamp_in_place(samples: &mut [f32]) {
    for sample in samples.iter_mut() {
        *sample = clamp_sample(*sample);
    }
}

/// Copy one column of an interleaved block into `out`, clamping each sample
///
/// `out` receives `interleaved.len() / channels` samples; the caller sizes it.
pub fn extract_channel_clamped(interleaved: &[f32], channels: usize, channel: usize, out: &mut [f32]) {
    debug_assert!(channel < channels);
    for (dst, frame) in out.iter_mut().zip(interleaved.chunks_exact(channels)) {
        *dst = clamp_sample(frame[channel]);
    }
}

// ============================================================================
// Sample Buffer
// ============================================================================

/// Fixed-capacity block of interleaved `f32` samples
///
/// # Example
/// ```
/// use mixdown::engine::buffer::SampleBuffer;
///
/// // 512 stereo frames
/// let buffer = SampleBuffer::for_frames(512, 2).unwrap();
/// assert_eq!(buffer.capacity(), 1024);
/// assert_eq!(buffer.byte_size(), 4096);
/// ```
#[derive(Debug)]
pub struct SampleBuffer {
    data: Vec<f32>,
}

impl SampleBuffer {
    /// Allocate a zeroed buffer of exactly `byte_size` bytes
    ///
    /// Fails with `Allocation` if the size is not a whole number of samples
    /// or the memory cannot be reserved.
    pub fn allocate(byte_size: usize) -> Result<Self> {
        if byte_size % SAMPLE_BYTES != 0 {
            return Err(MixdownError::Allocation {
                requested_bytes: byte_size,
            });
        }

        let samples = byte_size / SAMPLE_BYTES;
        let mut data = Vec::new();
        data.try_reserve_exact(samples)
            .map_err(|_| MixdownError::Allocation {
                requested_bytes: byte_size,
            })?;
        data.resize(samples, 0.0);

        Ok(Self { data })
    }

    /// Allocate room for `frames` interleaved frames of `channels` samples
    pub fn for_frames(frames: usize, channels: usize) -> Result<Self> {
        let byte_size = frames
            .checked_mul(channels)
            .and_then(|samples| samples.checked_mul(SAMPLE_BYTES))
            .ok_or(MixdownError::Allocation {
                requested_bytes: usize::MAX,
            })?;
        Self::allocate(byte_size)
    }

    /// Capacity in samples
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Capacity in bytes
    #[inline]
    pub fn byte_size(&self) -> usize {
        self.data.len() * SAMPLE_BYTES
    }

    /// Whole block as a slice
    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// The first `frames` frames, never past capacity
    pub fn filled(&self, frames: usize, channels: usize) -> &[f32] {
        let end = frames.saturating_mul(channels).min(self.data.len());
        &self.data[..end]
    }

    /// Mutable view of the first `frames` frames, never past capacity
    pub fn filled_mut(&mut self, frames: usize, channels: usize) -> &mut [f32] {
        let end = frames.saturating_mul(channels).min(self.data.len());
        &mut self.data[..end]
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_sample_bounds() {
        let inputs = [-3.5_f32, -1.0, -0.25, 0.0, 0.75, 1.0, 1.0001, f32::INFINITY, f32::NEG_INFINITY];
        for v in inputs {
            assert_eq!(clamp_sample(v), v.min(1.0).max(-1.0), "input {}", v);
        }
    }

    #[test]
    fn test_clamp_nan_is_silence() {
        assert_eq!(clamp_sample(f32::NAN), 0.0);
    }

    #[test]
    fn test_clamp_in_place() {
        let mut samples = vec![2.0, -2.0, 0.5, -0.5];
        clamp_in_place(&mut samples);
        assert_eq!(samples, vec![1.0, -1.0, 0.5, -0.5]);
    }

    #[test]
    fn test_extract_channel_clamped() {
        let interleaved = vec![0.1, 5.0, -0.3, 0.2, -7.0, 0.4];
        let mut out = vec![0.0; 3];

        extract_channel_clamped(&interleaved, 2, 0, &mut out);
        assert_eq!(out, vec![0.1, -0.3, -1.0]);

        extract_channel_clamped(&interleaved, 2, 1, &mut out);
        assert_eq!(out, vec![1.0, 0.2, 0.4]);
    }

    #[test]
    fn test_allocate_exact_size_zeroed() {
        let buffer = SampleBuffer::allocate(64).unwrap();
        assert_eq!(buffer.capacity(), 16);
        assert_eq!(buffer.byte_size(), 64);
        assert!(buffer.as_slice().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_allocate_rejects_partial_sample() {
        match SampleBuffer::allocate(10) {
            Err(MixdownError::Allocation { requested_bytes }) => assert_eq!(requested_bytes, 10),
            other => panic!("Expected Allocation error, got: {:?}", other),
        }
    }

    #[test]
    fn test_for_frames_overflow_is_allocation_error() {
        let result = SampleBuffer::for_frames(usize::MAX, 2);
        assert!(matches!(result, Err(MixdownError::Allocation { .. })));
    }

    #[test]
    fn test_filled_views_stay_within_capacity() {
        let mut buffer = SampleBuffer::for_frames(4, 2).unwrap();
        assert_eq!(buffer.filled(3, 2).len(), 6);
        assert_eq!(buffer.filled(100, 2).len(), 8);
        buffer.filled_mut(1, 2).copy_from_slice(&[0.5, -0.5]);
        assert_eq!(&buffer.as_slice()[..3], &[0.5, -0.5, 0.0]);
    }
}
