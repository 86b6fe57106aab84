//! Mixdown Module
//!
//! Drains a source through a bounded buffer into one or more sinks,
//! reporting progress once per chunk.

pub mod driver;
pub mod request;

pub use driver::{MixdownDriver, MixdownReport, MAX_EMPTY_READS};
pub use request::{progress_value, MixdownRequest, ProgressCallback, UNKNOWN_PROGRESS};
