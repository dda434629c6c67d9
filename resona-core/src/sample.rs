//! Sample formats and amplitude quantization.
//!
//! The producer speaks one language: a normalized amplitude in `[0.0, 1.0]`.
//! The hardware speaks another: whichever storage representation the device
//! negotiated. `OutputSample` is the seam between the two — one quantization
//! function per supported format, fixed for the lifetime of a stream.
//!
//! ## Known quirk, kept on purpose
//!
//! The integer mappings scale linearly by the type's maximum value, so the
//! `i16` output spans `[0, 32767]` and never uses the negative half-range.
//! This reproduces the long-standing behavior of the driver this crate
//! replaces; downstream captures depend on the exact sample values, so the
//! mapping is preserved rather than re-centered around zero.

use cpal::SizedSample;
use serde::{Deserialize, Serialize};

/// The closed set of storage representations the driver can negotiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    /// 16-bit signed integer samples.
    I16,
    /// 16-bit unsigned integer samples.
    U16,
    /// 32-bit float samples, nominal full scale 1.0.
    F32,
}

impl SampleFormat {
    pub fn to_cpal(self) -> cpal::SampleFormat {
        match self {
            SampleFormat::I16 => cpal::SampleFormat::I16,
            SampleFormat::U16 => cpal::SampleFormat::U16,
            SampleFormat::F32 => cpal::SampleFormat::F32,
        }
    }

    /// `None` for hardware formats outside the supported set.
    pub fn from_cpal(format: cpal::SampleFormat) -> Option<Self> {
        match format {
            cpal::SampleFormat::I16 => Some(SampleFormat::I16),
            cpal::SampleFormat::U16 => Some(SampleFormat::U16),
            cpal::SampleFormat::F32 => Some(SampleFormat::F32),
            _ => None,
        }
    }
}

impl std::fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleFormat::I16 => f.write_str("i16"),
            SampleFormat::U16 => f.write_str("u16"),
            SampleFormat::F32 => f.write_str("f32"),
        }
    }
}

/// A concrete sample storage type the ring and the hardware stream share.
///
/// `from_level` receives an amplitude already clamped to `[0.0, 1.0]`; the
/// clamp lives at the producer API boundary so quantization stays branch-free.
pub trait OutputSample: SizedSample + Copy + Default + Send + 'static {
    /// The quantized zero-amplitude value, i.e. `from_level(0.0)`.
    /// Used to pad underruns before anything was ever delivered.
    const SILENCE: Self;

    /// Map a normalized amplitude to this representation.
    fn from_level(level: f32) -> Self;
}

impl OutputSample for u16 {
    const SILENCE: Self = 0;

    fn from_level(level: f32) -> Self {
        (level * u16::MAX as f32).round() as u16
    }
}

impl OutputSample for i16 {
    const SILENCE: Self = 0;

    // Spans [0, i16::MAX]; the negative half-range is intentionally unused.
    fn from_level(level: f32) -> Self {
        (level * i16::MAX as f32).round() as i16
    }
}

impl OutputSample for f32 {
    const SILENCE: Self = 0.0;

    fn from_level(level: f32) -> Self {
        level
    }
}
