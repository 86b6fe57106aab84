//! Mixdown - streaming audio render pipeline
//!
//! Drains a decoded source through a fixed-size buffer, saturates samples
//! to [-1, 1] and writes them to one sink or fans them out to one mono sink
//! per channel, reporting progress as it goes.
//!
//! # Architecture
//!
//! - `engine`: stream specs, the sample buffer, source/sink capabilities
//! - `mixdown`: the chunk loop and progress callbacks
//! - `broadcast`: best-effort progress datagrams for external monitors
//! - `config` / `cli`: JSON configuration and the command-line front end

pub mod broadcast;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod mixdown;

pub use error::{MixdownError, Result};
