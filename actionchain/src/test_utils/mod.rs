//! Deterministic contexts and recording helpers for testing.
//!
//! Available behind the `test-utils` feature flag.

mod manual;
mod recorder;

pub use manual::ManualContexts;
pub use recorder::{Event, Recorder};
