//! Error handling for the mixdown pipeline
//!
//! Only allocation, source read, sink write and precondition failures ever
//! reach the caller of a mixdown pass. Progress broadcast failures are
//! handled inside the broadcaster and never show up here.

use thiserror::Error;

/// Result type alias for mixdown operations
pub type Result<T> = std::result::Result<T, MixdownError>;

/// Main error type for mixdown operations
#[derive(Error, Debug)]
pub enum MixdownError {
    // Pass Errors
    #[error("Failed to allocate sample buffer of {requested_bytes} bytes")]
    Allocation { requested_bytes: usize },

    #[error("Source read failed: {reason}")]
    SourceRead {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Sink write failed{}: {reason}", channel_suffix(.channel))]
    SinkWrite {
        channel: Option<usize>,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // Precondition Errors
    #[error("Invalid mixdown request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Fan-out needs one sink per channel: source has {channels} channels, got {sinks} sinks")]
    SinkCountMismatch { channels: usize, sinks: usize },

    #[error("Stream spec mismatch: {reason}")]
    SpecMismatch { reason: String },

    // File Errors
    #[error("File not found: {path}")]
    FileNotFound {
        path: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Invalid audio file: {reason}")]
    InvalidAudio {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    // Configuration Errors
    #[error("Configuration error: {reason}")]
    Config { reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn channel_suffix(channel: &Option<usize>) -> String {
    match channel {
        Some(c) => format!(" on channel {}", c),
        None => String::new(),
    }
}

impl MixdownError {
    /// Wrap a collaborator error raised while reading from a source
    pub fn source_read<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        MixdownError::SourceRead {
            reason: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    /// Wrap a collaborator error raised while writing to a sink
    pub fn sink_write<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        MixdownError::SinkWrite {
            channel: None,
            reason: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    /// Attach the fan-out channel index to a sink write error.
    ///
    /// Other variants are returned untouched.
    pub fn on_channel(self, index: usize) -> Self {
        match self {
            MixdownError::SinkWrite {
                channel: None,
                reason,
                source,
            } => MixdownError::SinkWrite {
                channel: Some(index),
                reason,
                source,
            },
            other => other,
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            MixdownError::Allocation { .. } => "ALLOCATION_FAILED",
            MixdownError::SourceRead { .. } => "SOURCE_READ_FAILED",
            MixdownError::SinkWrite { .. } => "SINK_WRITE_FAILED",
            MixdownError::InvalidRequest { .. } => "INVALID_REQUEST",
            MixdownError::SinkCountMismatch { .. } => "SINK_COUNT_MISMATCH",
            MixdownError::SpecMismatch { .. } => "SPEC_MISMATCH",
            MixdownError::FileNotFound { .. } => "FILE_NOT_FOUND",
            MixdownError::InvalidAudio { .. } => "INVALID_AUDIO",
            MixdownError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            MixdownError::Config { .. } => "CONFIG_ERROR",
            MixdownError::Io(_) => "IO_ERROR",
            MixdownError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error was raised before any I/O took place
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            MixdownError::InvalidRequest { .. }
                | MixdownError::SinkCountMismatch { .. }
                | MixdownError::SpecMismatch { .. }
        )
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            MixdownError::Allocation { .. } => vec![
                "Use a smaller --chunk-size",
                "Close other applications to free memory",
            ],
            MixdownError::SourceRead { .. } | MixdownError::InvalidAudio { .. } => vec![
                "Check if the input plays in another application",
                "The file may be corrupted - try re-exporting from source",
            ],
            MixdownError::SinkWrite { .. } => vec![
                "Check there is enough free disk space",
                "Verify the output location is writable",
                "Rerun the render; partial output is not resumed",
            ],
            MixdownError::SinkCountMismatch { .. } => {
                vec!["Provide exactly one output per source channel"]
            }
            MixdownError::SpecMismatch { .. } => vec![
                "Match the output channel count to the input",
                "Split renders need mono outputs at the input sample rate",
            ],
            MixdownError::UnsupportedFormat { .. } => vec![
                "Write to a .wav file",
                "Supported bit depths: 16, 24, 32",
            ],
            MixdownError::FileNotFound { .. } => vec![
                "Check the file path is correct",
                "Verify the file hasn't been moved or deleted",
            ],
            _ => vec![],
        }
    }
}
