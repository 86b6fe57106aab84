//! Render configuration
//!
//! Stored as JSON. Every field has a default, so a config file only needs
//! the values it changes.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::broadcast::BroadcastConfig;
use crate::engine::spec::SampleFormat;
use crate::error::{MixdownError, Result};
use crate::mixdown::MixdownRequest;

/// Default frames per chunk
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Default output bit depth
pub const DEFAULT_BIT_DEPTH: u16 = 24;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixdownConfig {
    /// Frames pulled from the source per iteration
    pub chunk_size: usize,
    /// Output bit depth: 16, 24 or 32 (float)
    pub bit_depth: u16,
    /// Progress side channel
    pub broadcast: BroadcastConfig,
}

impl Default for MixdownConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            bit_depth: DEFAULT_BIT_DEPTH,
            broadcast: BroadcastConfig::default(),
        }
    }
}

impl MixdownConfig {
    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MixdownError::FileNotFound {
                path: path.display().to_string(),
                source: None,
            });
        }

        let content = fs::read_to_string(path)?;
        let config: MixdownConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(MixdownError::Config {
                reason: "chunk_size must be greater than zero".to_string(),
            });
        }
        SampleFormat::for_bit_depth(self.bit_depth).map_err(|e| MixdownError::Config {
            reason: e.to_string(),
        })?;
        Ok(())
    }

    /// Output encoding selected by `bit_depth`
    pub fn output_format(&self) -> Result<SampleFormat> {
        SampleFormat::for_bit_depth(self.bit_depth)
    }

    /// Request for a pass of `length` frames (0 = until end-of-stream)
    pub fn request(&self, length: u64) -> MixdownRequest {
        MixdownRequest::bounded(length, self.chunk_size)
    }
}
