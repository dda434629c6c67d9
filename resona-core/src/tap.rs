//! Raw-audio diagnostic tap.
//!
//! When enabled, every normalized sample accepted from the producer is also
//! appended to a mono float WAV file. The tap lives on the producer thread,
//! never the callback thread, and is best-effort: a failed write disables
//! the tap with a warning instead of disturbing playback.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::error::Result;

/// Appends normalized samples to a mono 32-bit-float WAV file.
pub struct SampleTap {
    writer: hound::WavWriter<BufWriter<File>>,
}

impl SampleTap {
    /// Create the WAV file at `path`, stamped with the negotiated rate.
    pub fn create(path: &Path, sample_rate: u32) -> Result<Self> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let writer = hound::WavWriter::create(path, spec)?;
        Ok(Self { writer })
    }

    /// Append one normalized sample.
    pub fn write(&mut self, level: f32) -> Result<()> {
        self.writer.write_sample(level)?;
        Ok(())
    }

    /// Flush and close, patching up the WAV header.
    pub fn finalize(self) -> Result<()> {
        self.writer.finalize()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn written_samples_read_back_intact() {
        let path = std::env::temp_dir().join(format!("resona-tap-test-{}.wav", std::process::id()));

        let mut tap = SampleTap::create(&path, 44_100).expect("create tap");
        for level in [0.0f32, 0.25, 0.5, 1.0] {
            tap.write(level).expect("write sample");
        }
        tap.finalize().expect("finalize tap");

        let mut reader = hound::WavReader::open(&path).expect("open tap file");
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 44_100);
        assert_eq!(spec.sample_format, hound::SampleFormat::Float);

        let samples: Vec<f32> = reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .expect("read samples");
        assert_eq!(samples.len(), 4);
        assert_abs_diff_eq!(samples[1], 0.25);
        assert_abs_diff_eq!(samples[3], 1.0);

        let _ = std::fs::remove_file(&path);
    }
}
