//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::io::Write;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{info, warn};

use crate::broadcast::ProgressListener;
use crate::config::MixdownConfig;
use crate::engine::io::{create_writer, split_channel_paths, SampleSink, SampleSource, WavSource};
use crate::engine::spec::StreamSpec;
use crate::error::{MixdownError, Result};
use crate::mixdown::{MixdownDriver, MixdownReport, UNKNOWN_PROGRESS};

/// Options of the `render` command
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    pub length: u64,
    pub chunk_size: Option<usize>,
    pub bit_depth: Option<u16>,
    pub split_channels: bool,
    pub no_broadcast: bool,
    pub config: Option<PathBuf>,
}

impl RenderOptions {
    /// Config file (or defaults) with command-line overrides applied
    pub fn resolve_config(&self) -> Result<MixdownConfig> {
        let mut config = match &self.config {
            Some(path) => MixdownConfig::load(path)?,
            None => MixdownConfig::default(),
        };
        if let Some(chunk_size) = self.chunk_size {
            config.chunk_size = chunk_size;
        }
        if let Some(bit_depth) = self.bit_depth {
            config.bit_depth = bit_depth;
        }
        if self.no_broadcast {
            config.broadcast.enabled = false;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Render `input` to `output` (or per-channel files next to it).
pub fn render(input: &Path, output: &Path, options: &RenderOptions) -> Result<MixdownReport> {
    info!("Rendering {} -> {}", input.display(), output.display());

    let config = options.resolve_config()?;
    let mut source = WavSource::open(input)?;
    let spec = source.spec();
    let out_spec = StreamSpec {
        format: config.output_format()?,
        ..spec
    };

    let mut driver = MixdownDriver::new(config.request(options.length))?;
    if config.broadcast.enabled {
        driver = driver.with_broadcast(config.broadcast);
    }

    println!(
        "Input: {} ch @ {} Hz, {} frames",
        spec.channels,
        spec.sample_rate,
        source.total_frames()
    );

    let mut last_percent = None;
    let mut show_progress = |progress: f32| {
        if progress == UNKNOWN_PROGRESS {
            return;
        }
        let percent = (progress * 100.0).floor() as u32;
        if last_percent != Some(percent) {
            last_percent = Some(percent);
            eprint!("\rRendering: {:3}%", percent);
            let _ = std::io::stderr().flush();
        }
    };

    let report = if options.split_channels {
        let paths = split_channel_paths(output, spec.channel_count());
        let mut sinks = paths
            .iter()
            .map(|path| create_writer(path, out_spec.mono()))
            .collect::<Result<Vec<Box<dyn SampleSink>>>>()?;

        let report = driver.render_split(&mut source, &mut sinks, Some(&mut show_progress))?;
        for sink in sinks.iter_mut() {
            sink.finish()?;
        }
        for path in &paths {
            println!("Wrote: {}", path.display());
        }
        report
    } else {
        let mut sink = create_writer(output, out_spec)?;
        let report = driver.render(&mut source, &mut sink, Some(&mut show_progress))?;
        sink.finish()?;
        println!("Wrote: {}", output.display());
        report
    };

    eprintln!();
    println!(
        "Rendered {} frames in {} chunks{}",
        report.frames_written,
        report.chunks,
        if driver.request().is_bounded() && report.frames_written < driver.request().length {
            " (input ended early)"
        } else {
            ""
        }
    );

    Ok(report)
}

/// Print progress datagrams until `count` arrive or nothing arrives for `timeout`.
pub fn monitor(port: u16, count: Option<usize>, timeout: Duration) -> Result<usize> {
    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port);
    let listener = ProgressListener::bind(addr)?;
    info!("Listening for mixdown progress on {}", listener.local_addr()?);

    let mut received = 0;
    while count.map_or(true, |limit| received < limit) {
        match listener.recv_timeout(timeout) {
            Ok(Some(message)) => {
                received += 1;
                match message.fraction() {
                    Some(fraction) => println!(
                        "[{}] {}/{} ({:.1}%)",
                        message.pid,
                        message.position,
                        message.length,
                        fraction * 100.0
                    ),
                    None => println!("[{}] {} frames", message.pid, message.position),
                }
            }
            Ok(None) => {
                info!("No progress for {:?}, stopping", timeout);
                break;
            }
            Err(MixdownError::Serialization(e)) => {
                warn!("Ignoring malformed progress datagram: {}", e);
            }
            Err(e) => return Err(e),
        }
    }

    Ok(received)
}

/// Write the default config file.
pub fn default_config(path: &Path) -> Result<()> {
    info!("Writing default config: {}", path.display());
    MixdownConfig::default().save(path)?;
    println!("Config written: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::io::WavSink;
    use crate::engine::spec::SampleFormat;
    use tempfile::tempdir;

    fn write_input(path: &Path, frames: usize) {
        let spec = StreamSpec::new(2, 48000, SampleFormat::F32);
        let mut sink = WavSink::create(path, spec).unwrap();
        let samples: Vec<f32> = (0..frames).flat_map(|_| [0.5, -2.0]).collect();
        sink.write(frames, &samples).unwrap();
        sink.finish().unwrap();
    }

    fn quiet_options() -> RenderOptions {
        RenderOptions {
            chunk_size: Some(4),
            bit_depth: Some(32),
            no_broadcast: true,
            ..RenderOptions::default()
        }
    }

    #[test]
    fn test_render_command_clamps_into_file() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.wav");
        let output = dir.path().join("out.wav");
        write_input(&input, 10);

        let report = render(&input, &output, &quiet_options()).unwrap();
        assert_eq!(report.frames_written, 10);
        assert_eq!(report.chunks, 3);

        let mut rendered = WavSource::open(&output).unwrap();
        let mut buf = vec![0.0; 20];
        assert_eq!(rendered.read(10, &mut buf).unwrap().frames, 10);
        for frame in buf.chunks_exact(2) {
            assert_eq!(frame, &[0.5, -1.0]);
        }
    }

    #[test]
    fn test_render_command_split_channels() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.wav");
        let output = dir.path().join("mix.wav");
        write_input(&input, 6);

        let options = RenderOptions {
            split_channels: true,
            length: 5,
            ..quiet_options()
        };
        let report = render(&input, &output, &options).unwrap();
        assert_eq!(report.frames_written, 5);

        let mut left = WavSource::open(&dir.path().join("mix_ch0.wav")).unwrap();
        let mut right = WavSource::open(&dir.path().join("mix_ch1.wav")).unwrap();
        assert_eq!(left.spec().channels, 1);
        assert_eq!(left.total_frames(), 5);

        let mut buf = vec![0.0; 5];
        left.read(5, &mut buf).unwrap();
        assert!(buf.iter().all(|&s| s == 0.5));
        right.read(5, &mut buf).unwrap();
        assert!(buf.iter().all(|&s| s == -1.0));
    }

    #[test]
    fn test_render_command_missing_input() {
        let dir = tempdir().unwrap();
        let err = render(
            &dir.path().join("missing.wav"),
            &dir.path().join("out.wav"),
            &quiet_options(),
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "FILE_NOT_FOUND");
    }

    #[test]
    fn test_resolve_config_overrides() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        default_config(&path).unwrap();

        let options = RenderOptions {
            chunk_size: Some(64),
            no_broadcast: true,
            config: Some(path),
            ..RenderOptions::default()
        };
        let config = options.resolve_config().unwrap();
        assert_eq!(config.chunk_size, 64);
        assert_eq!(config.bit_depth, 24);
        assert!(!config.broadcast.enabled);
    }

    #[test]
    fn test_resolve_config_rejects_zero_chunk() {
        let options = RenderOptions {
            chunk_size: Some(0),
            ..RenderOptions::default()
        };
        assert!(options.resolve_config().is_err());
    }
}
