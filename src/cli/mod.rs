//! CLI Module
//!
//! Command-line interface for rendering WAV mixdowns and watching their
//! progress from another process.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::broadcast::PROGRESS_PORT;

/// Mixdown - streaming audio render with progress broadcast
#[derive(Parser, Debug)]
#[command(name = "mixdown")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render an input file to one output (or one output per channel)
    #[command(name = "render")]
    Render {
        /// Input WAV file
        input: PathBuf,

        /// Output WAV file; with --split-channels, the base name for per-channel files
        output: PathBuf,

        /// Frames to render (0 renders until the input ends)
        #[arg(short, long, default_value_t = 0)]
        length: u64,

        /// Frames per chunk (overrides the config file)
        #[arg(short, long)]
        chunk_size: Option<usize>,

        /// Output bit depth: 16, 24 or 32 (overrides the config file)
        #[arg(short, long)]
        bit_depth: Option<u16>,

        /// Write one mono file per input channel
        #[arg(long)]
        split_channels: bool,

        /// Do not broadcast progress datagrams
        #[arg(long)]
        no_broadcast: bool,

        /// JSON config file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print progress messages sent by running renders
    #[command(name = "monitor")]
    Monitor {
        /// Loopback port to listen on
        #[arg(short, long, default_value_t = PROGRESS_PORT)]
        port: u16,

        /// Stop after this many messages
        #[arg(short, long)]
        count: Option<usize>,

        /// Stop after this long without a message
        #[arg(short, long, default_value_t = 10_000)]
        timeout_ms: u64,
    },

    /// Write the default JSON config
    #[command(name = "default-config")]
    DefaultConfig {
        /// Destination file
        path: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_render() {
        let cli = Cli::parse_from([
            "mixdown",
            "render",
            "in.wav",
            "out.wav",
            "--length",
            "48000",
            "--split-channels",
            "--no-broadcast",
        ]);
        match cli.command {
            Some(Commands::Render {
                length,
                split_channels,
                no_broadcast,
                chunk_size,
                ..
            }) => {
                assert_eq!(length, 48000);
                assert!(split_channels);
                assert!(no_broadcast);
                assert_eq!(chunk_size, None);
            }
            other => panic!("Expected Render, got: {:?}", other),
        }
    }

    #[test]
    fn test_parse_monitor_defaults() {
        let cli = Cli::parse_from(["mixdown", "monitor"]);
        match cli.command {
            Some(Commands::Monitor { port, count, timeout_ms }) => {
                assert_eq!(port, 1609);
                assert_eq!(count, None);
                assert_eq!(timeout_ms, 10_000);
            }
            other => panic!("Expected Monitor, got: {:?}", other),
        }
    }
}
