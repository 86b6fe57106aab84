//! Audio Engine Module
//!
//! Building blocks a mixdown pass runs on:
//! - Stream specifications
//! - The fixed-capacity sample buffer and clamping
//! - Source/sink capabilities and their WAV and in-memory implementations

pub mod buffer;
pub mod io;
pub mod memory;
pub mod spec;

pub use buffer::{clamp_in_place, clamp_sample, extract_channel_clamped, SampleBuffer};
pub use io::{create_writer, split_channel_paths, ReadStatus, SampleSink, SampleSource, WavSink, WavSource};
pub use memory::{MemorySink, MemorySource};
pub use spec::{SampleFormat, StreamSpec};
