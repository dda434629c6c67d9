//! # resona-core
//!
//! Latency-buffered mono audio playback driver.
//!
//! ## Architecture
//!
//! ```text
//! Engine → add_sample(level) → quantize → (mutex) SampleRing.push
//!                                   │
//!                            PlaybackGate (hysteresis on occupancy)
//!                                   │ pause/resume
//! Hardware clock → pull callback → (mutex) SampleRing.pop_block
//!                                   → underrun padding → device
//! ```
//!
//! The producer pushes one normalized sample per call at its own cadence and
//! is never blocked. The hardware callback pulls fixed blocks on its own
//! real-time thread and is never starved — shortfalls are masked by repeating
//! the last delivered sample. The audio callback is zero-alloc; both critical
//! sections are bounded memcpys.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod buffering;
pub mod error;
pub mod gate;
pub mod metrics;
pub mod output;
pub mod sample;
pub mod tap;

// Convenience re-exports for downstream crates
pub use buffering::SampleRing;
pub use error::ResonaError;
pub use gate::{PlaybackGate, PlaybackState};
pub use metrics::MetricsSnapshot;
pub use output::{AudioOutput, NegotiatedSpec, OutputConfig, PlaybackEvent};
pub use sample::{OutputSample, SampleFormat};
