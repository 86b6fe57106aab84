//! Source and sink capabilities plus their WAV implementations
//!
//! The mixdown driver only ever sees `SampleSource` and `SampleSink`.
//! Decoding and encoding stay behind those traits; WAV support via `hound`
//! is the one container shipped with the crate.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use hound::{WavReader, WavSpec, WavWriter};

use crate::engine::spec::{SampleFormat, StreamSpec};
use crate::error::{MixdownError, Result};

// ============================================================================
// Capability traits
// ============================================================================

/// Outcome of a single source read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadStatus {
    /// Frames actually written into the caller's buffer
    pub frames: usize,
    /// No further frames will be produced
    pub end_of_stream: bool,
}

/// Producer of interleaved `f32` frames
pub trait SampleSource {
    /// Layout of the frames this source produces
    fn spec(&self) -> StreamSpec;

    /// Fill `buffer` with up to `frames` interleaved frames
    ///
    /// `buffer` holds at least `frames * spec().channels` samples. Producing
    /// fewer frames than requested is allowed; `end_of_stream` tells the
    /// caller whether more can follow. Errors are fatal for the pass.
    fn read(&mut self, frames: usize, buffer: &mut [f32]) -> Result<ReadStatus>;
}

/// Consumer of interleaved `f32` frames
pub trait SampleSink {
    /// Layout of the frames this sink accepts
    fn spec(&self) -> StreamSpec;

    /// Consume the first `frames` frames of `buffer`
    fn write(&mut self, frames: usize, buffer: &[f32]) -> Result<()>;

    /// Flush and close the underlying container
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<T: SampleSource + ?Sized> SampleSource for Box<T> {
    fn spec(&self) -> StreamSpec {
        (**self).spec()
    }

    fn read(&mut self, frames: usize, buffer: &mut [f32]) -> Result<ReadStatus> {
        (**self).read(frames, buffer)
    }
}

impl<T: SampleSink + ?Sized> SampleSink for Box<T> {
    fn spec(&self) -> StreamSpec {
        (**self).spec()
    }

    fn write(&mut self, frames: usize, buffer: &[f32]) -> Result<()> {
        (**self).write(frames, buffer)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}

fn required_samples(frames: usize, spec: &StreamSpec, available: usize) -> Result<usize> {
    let needed = frames * spec.channel_count();
    if needed > available {
        return Err(MixdownError::SinkWrite {
            channel: None,
            reason: format!("buffer holds {} samples, {} frames need {}", available, frames, needed),
            source: None,
        });
    }
    Ok(needed)
}

// ============================================================================
// WAV source
// ============================================================================

/// Streaming WAV decoder
pub struct WavSource {
    reader: WavReader<BufReader<File>>,
    spec: StreamSpec,
    total_frames: u64,
    position: u64,
}

impl WavSource {
    /// Open a WAV file for streaming
    ///
    /// # Errors
    /// * `FileNotFound` - If the file does not exist
    /// * `InvalidAudio` - If the file is not a valid WAV file
    /// * `UnsupportedFormat` - If the sample encoding is not supported
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MixdownError::FileNotFound {
                path: path.display().to_string(),
                source: None,
            });
        }

        let reader = WavReader::open(path).map_err(|e| MixdownError::InvalidAudio {
            reason: format!("Failed to open WAV file: {}", e),
            source: Some(Box::new(e)),
        })?;

        let wav = reader.spec();
        if wav.channels == 0 {
            return Err(MixdownError::InvalidAudio {
                reason: "WAV header declares zero channels".to_string(),
                source: None,
            });
        }
        let format = SampleFormat::from_bits(
            wav.bits_per_sample,
            wav.sample_format == hound::SampleFormat::Float,
        )?;

        Ok(Self {
            spec: StreamSpec::new(wav.channels, wav.sample_rate, format),
            total_frames: reader.duration() as u64,
            reader,
            position: 0,
        })
    }

    /// Total length of the file in frames
    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    fn read_converted<S, F>(&mut self, out: &mut [f32], convert: F) -> Result<usize>
    where
        S: hound::Sample,
        F: Fn(S) -> f32,
    {
        let mut count = 0;
        for (dst, sample) in out.iter_mut().zip(self.reader.samples::<S>()) {
            *dst = convert(sample.map_err(MixdownError::source_read)?);
            count += 1;
        }
        Ok(count)
    }
}

impl SampleSource for WavSource {
    fn spec(&self) -> StreamSpec {
        self.spec
    }

    fn read(&mut self, frames: usize, buffer: &mut [f32]) -> Result<ReadStatus> {
        let channels = self.spec.channel_count();
        let remaining = self.total_frames.saturating_sub(self.position);
        let frames = frames
            .min(usize::try_from(remaining).unwrap_or(usize::MAX))
            .min(buffer.len() / channels);
        let out = &mut buffer[..frames * channels];

        let samples = match self.spec.format {
            SampleFormat::F32 => self.read_converted::<f32, _>(out, |v| v)?,
            SampleFormat::U8 => self.read_converted::<i8, _>(out, |v| v as f32 / 128.0)?,
            SampleFormat::S16 => self.read_converted::<i16, _>(out, |v| v as f32 / 32768.0)?,
            // 24-bit stored as i32 in hound
            SampleFormat::S24 => self.read_converted::<i32, _>(out, |v| v as f32 / 8388608.0)?,
            SampleFormat::S32 => {
                self.read_converted::<i32, _>(out, |v| v as f32 / 2147483648.0)?
            }
        };

        let produced = samples / channels;
        self.position += produced as u64;

        Ok(ReadStatus {
            frames: produced,
            end_of_stream: produced < frames || self.position >= self.total_frames,
        })
    }
}

// ============================================================================
// WAV sink
// ============================================================================

/// Streaming WAV encoder
pub struct WavSink {
    writer: Option<WavWriter<BufWriter<File>>>,
    spec: StreamSpec,
    path: PathBuf,
}

impl WavSink {
    /// Create (or truncate) a WAV file with the given layout
    pub fn create(path: &Path, spec: StreamSpec) -> Result<Self> {
        if spec.channels == 0 {
            return Err(MixdownError::SpecMismatch {
                reason: "cannot write a WAV file with zero channels".to_string(),
            });
        }
        if spec.format == SampleFormat::U8 {
            return Err(MixdownError::UnsupportedFormat {
                format: "8-bit output (only 16, 24, 32 supported)".to_string(),
            });
        }

        let wav = WavSpec {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            bits_per_sample: spec.format.bits(),
            sample_format: if spec.format.is_float() {
                hound::SampleFormat::Float
            } else {
                hound::SampleFormat::Int
            },
        };

        let writer = WavWriter::create(path, wav).map_err(|e| {
            MixdownError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("{}: {}", path.display(), e),
            ))
        })?;

        Ok(Self {
            writer: Some(writer),
            spec,
            path: path.to_path_buf(),
        })
    }

    /// Destination path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SampleSink for WavSink {
    fn spec(&self) -> StreamSpec {
        self.spec
    }

    fn write(&mut self, frames: usize, buffer: &[f32]) -> Result<()> {
        let needed = required_samples(frames, &self.spec, buffer.len())?;
        let writer = self.writer.as_mut().ok_or_else(|| MixdownError::SinkWrite {
            channel: None,
            reason: format!("{} is already finalized", self.path.display()),
            source: None,
        })?;

        let samples = &buffer[..needed];
        match self.spec.format {
            SampleFormat::S16 => {
                for &sample in samples {
                    let scaled = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
                    writer.write_sample(scaled).map_err(MixdownError::sink_write)?;
                }
            }
            SampleFormat::S24 => {
                for &sample in samples {
                    // 24-bit stored as i32 in hound
                    let scaled = (sample * 8388607.0).clamp(-8388608.0, 8388607.0) as i32;
                    writer.write_sample(scaled).map_err(MixdownError::sink_write)?;
                }
            }
            SampleFormat::S32 => {
                for &sample in samples {
                    let scaled = (sample as f64 * 2147483647.0)
                        .clamp(-2147483648.0, 2147483647.0) as i32;
                    writer.write_sample(scaled).map_err(MixdownError::sink_write)?;
                }
            }
            SampleFormat::F32 => {
                for &sample in samples {
                    writer.write_sample(sample).map_err(MixdownError::sink_write)?;
                }
            }
            SampleFormat::U8 => {
                return Err(MixdownError::UnsupportedFormat {
                    format: "8-bit output".to_string(),
                })
            }
        }

        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        match self.writer.take() {
            Some(writer) => writer.finalize().map_err(MixdownError::sink_write),
            None => Ok(()),
        }
    }
}

// ============================================================================
// Writer factory
// ============================================================================

/// Create a sink for `path`, picking the container from its extension
pub fn create_writer(path: &Path, spec: StreamSpec) -> Result<Box<dyn SampleSink>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "wav" | "wave" => Ok(Box::new(WavSink::create(path, spec)?)),
        "" => Err(MixdownError::UnsupportedFormat {
            format: format!("{} has no container extension", path.display()),
        }),
        other => Err(MixdownError::UnsupportedFormat {
            format: format!(".{} container (only .wav supported)", other),
        }),
    }
}

/// Per-channel output paths for a split render: `mix.wav` -> `mix_ch0.wav`, ...
pub fn split_channel_paths(base: &Path, channels: usize) -> Vec<PathBuf> {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mixdown".to_string());
    let extension = base
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "wav".to_string());

    (0..channels)
        .map(|c| base.with_file_name(format!("{}_ch{}.{}", stem, c, extension)))
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_wav(path: &Path, spec: StreamSpec, interleaved: &[f32]) {
        let mut sink = WavSink::create(path, spec).unwrap();
        let frames = interleaved.len() / spec.channel_count();
        sink.write(frames, interleaved).unwrap();
        sink.finish().unwrap();
    }

    #[test]
    fn test_wav_round_trip_float_stereo() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = StreamSpec::new(2, 48000, SampleFormat::F32);
        let data = vec![0.1, -0.1, 0.2, -0.2, 0.3, -0.3];
        write_wav(&path, spec, &data);

        let mut source = WavSource::open(&path).unwrap();
        assert_eq!(source.spec(), spec);
        assert_eq!(source.total_frames(), 3);

        let mut buf = vec![0.0; 8];
        let status = source.read(4, &mut buf).unwrap();
        assert_eq!(status.frames, 3);
        assert!(status.end_of_stream);
        assert_eq!(&buf[..6], data.as_slice());
    }

    #[test]
    fn test_wav_source_partial_reads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        let spec = StreamSpec::new(1, 44100, SampleFormat::S16);
        write_wav(&path, spec, &[0.0, 0.25, 0.5, -0.5, -0.25]);

        let mut source = WavSource::open(&path).unwrap();
        let mut buf = vec![0.0; 2];

        let first = source.read(2, &mut buf).unwrap();
        assert_eq!(first, ReadStatus { frames: 2, end_of_stream: false });
        assert!((buf[1] - 0.25).abs() < 0.001);

        let second = source.read(2, &mut buf).unwrap();
        assert_eq!(second, ReadStatus { frames: 2, end_of_stream: false });

        let third = source.read(2, &mut buf).unwrap();
        assert_eq!(third, ReadStatus { frames: 1, end_of_stream: true });
        assert!((buf[0] + 0.25).abs() < 0.001);
    }

    #[test]
    fn test_wav_24bit_quantization() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("24.wav");
        let spec = StreamSpec::new(1, 48000, SampleFormat::S24);
        let data = vec![0.5, -0.5, 0.999, -1.0];
        write_wav(&path, spec, &data);

        let mut source = WavSource::open(&path).unwrap();
        let mut buf = vec![0.0; 4];
        source.read(4, &mut buf).unwrap();
        for (orig, read) in data.iter().zip(buf.iter()) {
            assert!((orig - read).abs() < 0.001, "Sample mismatch: {} vs {}", orig, read);
        }
    }

    #[test]
    fn test_open_nonexistent_file() {
        match WavSource::open(Path::new("/nonexistent/path/audio.wav")) {
            Err(MixdownError::FileNotFound { path, .. }) => assert!(path.contains("nonexistent")),
            Err(other) => panic!("Expected FileNotFound error, got: {:?}", other),
            Ok(_) => panic!("Expected FileNotFound error"),
        }
    }

    #[test]
    fn test_sink_rejects_short_buffer() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.wav");
        let mut sink = WavSink::create(&path, StreamSpec::new(2, 48000, SampleFormat::F32)).unwrap();
        let err = sink.write(3, &[0.0; 4]).unwrap_err();
        assert_eq!(err.error_code(), "SINK_WRITE_FAILED");
    }

    #[test]
    fn test_write_after_finish_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("done.wav");
        let mut sink = WavSink::create(&path, StreamSpec::new(1, 48000, SampleFormat::S16)).unwrap();
        sink.finish().unwrap();
        assert!(sink.write(1, &[0.0]).is_err());
        // finishing twice is harmless
        sink.finish().unwrap();
    }

    #[test]
    fn test_create_writer_by_extension() {
        let dir = tempdir().unwrap();
        let spec = StreamSpec::new(2, 48000, SampleFormat::S24);

        let sink = create_writer(&dir.path().join("MIX.WAV"), spec).unwrap();
        assert_eq!(sink.spec(), spec);

        match create_writer(&dir.path().join("mix.flac"), spec) {
            Err(MixdownError::UnsupportedFormat { format }) => assert!(format.contains("flac")),
            Err(other) => panic!("Expected UnsupportedFormat, got: {:?}", other),
            Ok(_) => panic!("Expected UnsupportedFormat"),
        }
        assert!(create_writer(&dir.path().join("mix"), spec).is_err());
    }

    #[test]
    fn test_split_channel_paths() {
        let paths = split_channel_paths(Path::new("/tmp/out/mix.wav"), 3);
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/tmp/out/mix_ch0.wav"),
                PathBuf::from("/tmp/out/mix_ch1.wav"),
                PathBuf::from("/tmp/out/mix_ch2.wav"),
            ]
        );
    }
}
