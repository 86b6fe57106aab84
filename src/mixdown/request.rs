//! Mixdown requests and progress callbacks

use std::sync::mpsc::Sender;

use serde::{Deserialize, Serialize};

use crate::error::{MixdownError, Result};

/// Progress value reported when the total length is unknown
pub const UNKNOWN_PROGRESS: f32 = -1.0;

/// Length and chunking of one mixdown pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MixdownRequest {
    /// Total frames to render; 0 reads until end-of-stream
    pub length: u64,
    /// Frames pulled from the source per iteration
    pub chunk_size: usize,
}

impl MixdownRequest {
    pub fn bounded(length: u64, chunk_size: usize) -> Self {
        Self { length, chunk_size }
    }

    pub fn unbounded(chunk_size: usize) -> Self {
        Self {
            length: 0,
            chunk_size,
        }
    }

    #[inline]
    pub fn is_bounded(&self) -> bool {
        self.length > 0
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(MixdownError::InvalidRequest {
                reason: "chunk size must be at least one frame".to_string(),
            });
        }
        Ok(())
    }

    /// Frames to request for the chunk starting at `position`
    pub fn chunk_len(&self, position: u64) -> usize {
        if self.is_bounded() {
            let remaining = self.length.saturating_sub(position);
            usize::try_from(remaining).map_or(self.chunk_size, |r| r.min(self.chunk_size))
        } else {
            self.chunk_size
        }
    }

    /// Whether the loop should pull another chunk at `position`
    pub fn wants_more(&self, position: u64) -> bool {
        !self.is_bounded() || position < self.length
    }
}

/// `position / length` for bounded passes, `-1.0` otherwise
pub fn progress_value(position: u64, length: u64) -> f32 {
    if length > 0 {
        (position as f64 / length as f64) as f32
    } else {
        UNKNOWN_PROGRESS
    }
}

/// Receives progress once per chunk, right after the chunk is written
///
/// Runs on the mixdown thread; a slow callback stalls the pass.
pub trait ProgressCallback {
    fn on_progress(&mut self, progress: f32);
}

impl<F> ProgressCallback for F
where
    F: FnMut(f32),
{
    fn on_progress(&mut self, progress: f32) {
        self(progress)
    }
}

/// Forwards progress to another thread; a hung-up receiver is ignored
impl ProgressCallback for Sender<f32> {
    fn on_progress(&mut self, progress: f32) {
        let _ = self.send(progress);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    #[test]
    fn test_validate_rejects_zero_chunk() {
        assert!(MixdownRequest::bounded(10, 0).validate().is_err());
        assert!(MixdownRequest::unbounded(0).validate().is_err());
        assert!(MixdownRequest::bounded(10, 4).validate().is_ok());
    }

    #[test]
    fn test_chunk_len_bounded() {
        let request = MixdownRequest::bounded(10, 4);
        assert_eq!(request.chunk_len(0), 4);
        assert_eq!(request.chunk_len(4), 4);
        assert_eq!(request.chunk_len(8), 2);
        assert_eq!(request.chunk_len(10), 0);
    }

    #[test]
    fn test_chunk_len_unbounded() {
        let request = MixdownRequest::unbounded(256);
        assert_eq!(request.chunk_len(0), 256);
        assert_eq!(request.chunk_len(u64::MAX), 256);
        assert!(request.wants_more(u64::MAX));
    }

    #[test]
    fn test_wants_more_bounded() {
        let request = MixdownRequest::bounded(10, 4);
        assert!(request.wants_more(9));
        assert!(!request.wants_more(10));
    }

    #[test]
    fn test_progress_value() {
        assert_eq!(progress_value(5, 10), 0.5);
        assert_eq!(progress_value(10, 10), 1.0);
        assert_eq!(progress_value(123, 0), UNKNOWN_PROGRESS);
    }

    #[test]
    fn test_closure_callback_captures_context() {
        let mut seen = Vec::new();
        {
            let mut callback = |p: f32| seen.push(p);
            callback.on_progress(0.25);
            callback.on_progress(0.5);
        }
        assert_eq!(seen, vec![0.25, 0.5]);
    }

    #[test]
    fn test_sender_callback() {
        let (mut tx, rx) = channel();
        tx.on_progress(0.75);
        drop(rx);
        // receiver gone: must not panic
        tx.on_progress(1.0);
    }
}
