//! In-memory sources and sinks
//!
//! Used by the CLI for generated material and throughout the tests.

use crate::engine::io::{ReadStatus, SampleSink, SampleSource};
use crate::engine::spec::StreamSpec;
use crate::error::{MixdownError, Result};

/// Source that replays a fixed interleaved block
#[derive(Debug, Clone)]
pub struct MemorySource {
    samples: Vec<f32>,
    spec: StreamSpec,
    cursor: usize,
}

impl MemorySource {
    /// Wrap interleaved samples; trailing samples that do not fill a frame are dropped
    pub fn new(mut samples: Vec<f32>, spec: StreamSpec) -> Result<Self> {
        let channels = spec.channel_count();
        if channels == 0 {
            return Err(MixdownError::SpecMismatch {
                reason: "memory source needs at least one channel".to_string(),
            });
        }
        samples.truncate(samples.len() - samples.len() % channels);
        Ok(Self {
            samples,
            spec,
            cursor: 0,
        })
    }

    /// Generate one sine per channel at the given frequencies
    ///
    /// `frequencies.len()` must match `spec.channels`.
    pub fn test_tone(frequencies: &[f32], duration_secs: f32, spec: StreamSpec) -> Result<Self> {
        if frequencies.len() != spec.channel_count() {
            return Err(MixdownError::SpecMismatch {
                reason: format!(
                    "{} frequencies for {} channels",
                    frequencies.len(),
                    spec.channels
                ),
            });
        }

        let frames = (duration_secs * spec.sample_rate as f32) as usize;
        let mut samples = Vec::with_capacity(frames * frequencies.len());
        for i in 0..frames {
            for &freq in frequencies {
                let angular_freq = 2.0 * std::f32::consts::PI * freq / spec.sample_rate as f32;
                samples.push((angular_freq * i as f32).sin());
            }
        }

        Self::new(samples, spec)
    }

    /// Total length in frames
    pub fn total_frames(&self) -> usize {
        self.samples.len() / self.spec.channel_count()
    }
}

impl SampleSource for MemorySource {
    fn spec(&self) -> StreamSpec {
        self.spec
    }

    fn read(&mut self, frames: usize, buffer: &mut [f32]) -> Result<ReadStatus> {
        let channels = self.spec.channel_count();
        let available = (self.samples.len() - self.cursor) / channels;
        let produced = frames.min(available).min(buffer.len() / channels);
        let count = produced * channels;

        buffer[..count].copy_from_slice(&self.samples[self.cursor..self.cursor + count]);
        self.cursor += count;

        Ok(ReadStatus {
            frames: produced,
            end_of_stream: self.cursor >= self.samples.len(),
        })
    }
}

/// Sink that keeps everything written to it
#[derive(Debug, Clone)]
pub struct MemorySink {
    samples: Vec<f32>,
    spec: StreamSpec,
    writes: Vec<usize>,
    finished: bool,
}

impl MemorySink {
    pub fn new(spec: StreamSpec) -> Self {
        Self {
            samples: Vec::new(),
            spec,
            writes: Vec::new(),
            finished: false,
        }
    }

    /// Interleaved samples received so far
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Frame count of every `write` call, in order
    pub fn writes(&self) -> &[usize] {
        &self.writes
    }

    pub fn frames_written(&self) -> usize {
        self.writes.iter().sum()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl SampleSink for MemorySink {
    fn spec(&self) -> StreamSpec {
        self.spec
    }

    fn write(&mut self, frames: usize, buffer: &[f32]) -> Result<()> {
        let needed = frames * self.spec.channel_count();
        if needed > buffer.len() {
            return Err(MixdownError::SinkWrite {
                channel: None,
                reason: format!("buffer holds {} samples, need {}", buffer.len(), needed),
                source: None,
            });
        }
        self.samples.extend_from_slice(&buffer[..needed]);
        self.writes.push(frames);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::spec::SampleFormat;

    fn stereo() -> StreamSpec {
        StreamSpec::new(2, 48000, SampleFormat::F32)
    }

    #[test]
    fn test_memory_source_reports_eos_on_exhausting_read() {
        let mut source = MemorySource::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], stereo()).unwrap();
        let mut buf = vec![0.0; 4];

        let first = source.read(2, &mut buf).unwrap();
        assert_eq!(first, ReadStatus { frames: 2, end_of_stream: false });
        assert_eq!(buf, vec![1.0, 2.0, 3.0, 4.0]);

        let second = source.read(2, &mut buf).unwrap();
        assert_eq!(second, ReadStatus { frames: 1, end_of_stream: true });
        assert_eq!(&buf[..2], &[5.0, 6.0]);
    }

    #[test]
    fn test_memory_source_drops_partial_frame() {
        let source = MemorySource::new(vec![1.0, 2.0, 3.0], stereo()).unwrap();
        assert_eq!(source.total_frames(), 1);
    }

    #[test]
    fn test_test_tone_channels_differ() {
        let source = MemorySource::test_tone(&[440.0, 880.0], 0.01, stereo()).unwrap();
        assert_eq!(source.total_frames(), 480);
        let left = source.samples[2 * 100];
        let right = source.samples[2 * 100 + 1];
        assert!((left - right).abs() > 0.01);
    }

    #[test]
    fn test_test_tone_rejects_frequency_mismatch() {
        assert!(MemorySource::test_tone(&[440.0], 0.1, stereo()).is_err());
    }

    #[test]
    fn test_memory_sink_records_writes() {
        let mut sink = MemorySink::new(stereo());
        sink.write(1, &[0.5, -0.5, 9.0, 9.0]).unwrap();
        sink.write(2, &[0.1, 0.2, 0.3, 0.4]).unwrap();
        assert_eq!(sink.writes(), &[1, 2]);
        assert_eq!(sink.frames_written(), 3);
        assert_eq!(sink.samples(), &[0.5, -0.5, 0.1, 0.2, 0.3, 0.4]);
        assert!(sink.write(3, &[0.0; 4]).is_err());
    }
}
