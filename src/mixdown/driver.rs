//! The mixdown loop
//!
//! Pulls bounded chunks from a source, saturates every sample to [-1, 1] and
//! hands the result to one sink (`render`) or to one mono sink per channel
//! (`render_split`). The loop is single threaded and strictly sequential:
//! chunk N is written before chunk N+1 is read.

use log::{debug, trace};

use crate::broadcast::{BroadcastConfig, ProgressBroadcaster};
use crate::engine::buffer::{clamp_in_place, extract_channel_clamped, SampleBuffer};
use crate::engine::io::{SampleSink, SampleSource};
use crate::engine::spec::StreamSpec;
use crate::error::{MixdownError, Result};
use crate::mixdown::request::{progress_value, MixdownRequest, ProgressCallback};

/// Consecutive empty reads without end-of-stream before a source counts as stalled
pub const MAX_EMPTY_READS: usize = 64;

/// Summary of a completed pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MixdownReport {
    /// Frames delivered to the sink(s)
    pub frames_written: u64,
    /// Non-empty chunks processed
    pub chunks: usize,
    /// The source signalled end-of-stream
    pub end_of_stream: bool,
}

/// Runs mixdown passes for one request
#[derive(Debug, Clone)]
pub struct MixdownDriver {
    request: MixdownRequest,
    broadcast: Option<BroadcastConfig>,
}

impl MixdownDriver {
    /// Create a driver; rejects a zero chunk size
    pub fn new(request: MixdownRequest) -> Result<Self> {
        request.validate()?;
        Ok(Self {
            request,
            broadcast: None,
        })
    }

    /// Announce progress over the side channel on every chunk
    pub fn with_broadcast(mut self, config: BroadcastConfig) -> Self {
        self.broadcast = Some(config);
        self
    }

    /// The request every pass of this driver follows
    pub fn request(&self) -> &MixdownRequest {
        &self.request
    }

    /// Render `source` into a single sink with the same channel layout
    ///
    /// # Errors
    /// * `SpecMismatch` - channel counts differ (checked before any I/O)
    /// * `Allocation` - the chunk buffer cannot be reserved
    /// * whatever the source or sink report; the pass stops at the first one
    pub fn render(
        &self,
        source: &mut dyn SampleSource,
        sink: &mut dyn SampleSink,
        progress: Option<&mut dyn ProgressCallback>,
    ) -> Result<MixdownReport> {
        let spec = source.spec();
        let sink_spec = sink.spec();
        check_channels(&spec)?;
        if sink_spec.channels != spec.channels {
            return Err(MixdownError::SpecMismatch {
                reason: format!(
                    "source has {} channels but sink expects {}",
                    spec.channels, sink_spec.channels
                ),
            });
        }

        self.drive(source, spec, progress, |frames, block| {
            clamp_in_place(block);
            sink.write(frames, block)
        })
    }

    /// Render `source` into one mono sink per channel
    ///
    /// Sink `c` receives column `c` of the interleaved stream, clamped.
    ///
    /// # Errors
    /// * `SinkCountMismatch` - `sinks.len()` differs from the channel count
    /// * `SpecMismatch` - a sink is not mono at the source sample rate
    /// * `Allocation` - the chunk or column buffer cannot be reserved
    /// * `SinkWrite` tagged with the failing channel, or any source error
    pub fn render_split<S: SampleSink>(
        &self,
        source: &mut dyn SampleSource,
        sinks: &mut [S],
        progress: Option<&mut dyn ProgressCallback>,
    ) -> Result<MixdownReport> {
        let spec = source.spec();
        check_channels(&spec)?;
        let channels = spec.channel_count();
        if sinks.len() != channels {
            return Err(MixdownError::SinkCountMismatch {
                channels,
                sinks: sinks.len(),
            });
        }
        for (index, sink) in sinks.iter().enumerate() {
            let sink_spec = sink.spec();
            if sink_spec.channels != 1 || sink_spec.sample_rate != spec.sample_rate {
                return Err(MixdownError::SpecMismatch {
                    reason: format!(
                        "split sink {} is {} ch @ {} Hz, expected mono @ {} Hz",
                        index, sink_spec.channels, sink_spec.sample_rate, spec.sample_rate
                    ),
                });
            }
        }

        let mut mono = SampleBuffer::for_frames(self.request.chunk_size, 1)?;

        self.drive(source, spec, progress, |frames, block| {
            for (channel, sink) in sinks.iter_mut().enumerate() {
                let column = mono.filled_mut(frames, 1);
                extract_channel_clamped(block, channels, channel, column);
                sink.write(frames, column)
                    .map_err(|e| e.on_channel(channel))?;
            }
            Ok(())
        })
    }

    /// Shared chunk loop; `deliver` gets each non-empty interleaved chunk
    fn drive<F>(
        &self,
        source: &mut dyn SampleSource,
        spec: StreamSpec,
        mut progress: Option<&mut dyn ProgressCallback>,
        mut deliver: F,
    ) -> Result<MixdownReport>
    where
        F: FnMut(usize, &mut [f32]) -> Result<()>,
    {
        let request = self.request;
        let channels = spec.channel_count();
        let mut buffer = SampleBuffer::for_frames(request.chunk_size, channels)?;

        // closed on every exit path when dropped
        let mut broadcaster = match &self.broadcast {
            Some(config) => ProgressBroadcaster::open(config),
            None => ProgressBroadcaster::closed(BroadcastConfig::default().target),
        };

        debug!(
            "[MIXDOWN] Start: {} ch @ {} Hz, length {}, chunk {} frames",
            spec.channels,
            spec.sample_rate,
            if request.is_bounded() {
                request.length.to_string()
            } else {
                "unbounded".to_string()
            },
            request.chunk_size
        );

        let mut report = MixdownReport::default();
        let mut position: u64 = 0;
        let mut empty_reads = 0;

        while request.wants_more(position) && !report.end_of_stream {
            let len = request.chunk_len(position);
            let status = source.read(len, buffer.filled_mut(len, channels))?;
            let produced = status.frames.min(len);
            report.end_of_stream = status.end_of_stream;

            if produced == 0 {
                if !status.end_of_stream {
                    empty_reads += 1;
                    trace!("[MIXDOWN] Empty read {} at position {}", empty_reads, position);
                    if empty_reads >= MAX_EMPTY_READS {
                        return Err(MixdownError::SourceRead {
                            reason: format!(
                                "source produced no frames in {} consecutive reads at position {}",
                                empty_reads, position
                            ),
                            source: None,
                        });
                    }
                }
                continue;
            }
            empty_reads = 0;

            deliver(produced, buffer.filled_mut(produced, channels))?;

            position += produced as u64;
            report.frames_written = position;
            report.chunks += 1;

            broadcaster.send(position, request.length);

            let value = progress_value(position, request.length);
            if let Some(callback) = progress.as_deref_mut() {
                callback.on_progress(value);
            }

            trace!(
                "[MIXDOWN] Chunk {}: {} frames, position {}, eos {}",
                report.chunks,
                produced,
                position,
                status.end_of_stream
            );
        }

        broadcaster.close();

        debug!(
            "[MIXDOWN] Done: {} frames in {} chunks{}",
            report.frames_written,
            report.chunks,
            if report.end_of_stream { " (end of stream)" } else { "" }
        );

        Ok(report)
    }
}

fn check_channels(spec: &StreamSpec) -> Result<()> {
    if spec.channels == 0 {
        return Err(MixdownError::SpecMismatch {
            reason: "source reports zero channels".to_string(),
        });
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
