//! Playback counters for observability.
//!
//! Every counter is a relaxed atomic so the real-time callback can bump them
//! without taking a lock or allocating. Evictions and padded samples are
//! diagnostics, not errors — they never interrupt playback.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct OutputMetrics {
    /// Samples accepted from the producer.
    pub samples_pushed: AtomicU64,
    /// Samples discarded by overwrite-oldest on a full ring.
    pub samples_evicted: AtomicU64,
    /// Callback invocations served.
    pub blocks_pulled: AtomicU64,
    /// Real samples delivered to the hardware.
    pub samples_pulled: AtomicU64,
    /// Samples synthesized by underrun masking (last-sample repeats).
    pub samples_padded: AtomicU64,
    /// Gate transitions into `Playing`.
    pub gate_resumes: AtomicU64,
    /// Gate transitions into `Paused`.
    pub gate_pauses: AtomicU64,
}

impl OutputMetrics {
    pub fn reset(&self) {
        self.samples_pushed.store(0, Ordering::Relaxed);
        self.samples_evicted.store(0, Ordering::Relaxed);
        self.blocks_pulled.store(0, Ordering::Relaxed);
        self.samples_pulled.store(0, Ordering::Relaxed);
        self.samples_padded.store(0, Ordering::Relaxed);
        self.gate_resumes.store(0, Ordering::Relaxed);
        self.gate_pauses.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            samples_pushed: self.samples_pushed.load(Ordering::Relaxed),
            samples_evicted: self.samples_evicted.load(Ordering::Relaxed),
            blocks_pulled: self.blocks_pulled.load(Ordering::Relaxed),
            samples_pulled: self.samples_pulled.load(Ordering::Relaxed),
            samples_padded: self.samples_padded.load(Ordering::Relaxed),
            gate_resumes: self.gate_resumes.load(Ordering::Relaxed),
            gate_pauses: self.gate_pauses.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`OutputMetrics`].
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub samples_pushed: u64,
    pub samples_evicted: u64,
    pub blocks_pulled: u64,
    pub samples_pulled: u64,
    pub samples_padded: u64,
    pub gate_resumes: u64,
    pub gate_pauses: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let metrics = OutputMetrics::default();
        metrics.samples_pushed.fetch_add(42, Ordering::Relaxed);
        metrics.samples_padded.fetch_add(7, Ordering::Relaxed);

        let snap = metrics.snapshot();
        assert_eq!(snap.samples_pushed, 42);
        assert_eq!(snap.samples_padded, 7);
        assert_eq!(snap.samples_evicted, 0);
    }

    #[test]
    fn reset_zeroes_everything() {
        let metrics = OutputMetrics::default();
        metrics.samples_pushed.fetch_add(5, Ordering::Relaxed);
        metrics.gate_resumes.fetch_add(1, Ordering::Relaxed);
        metrics.reset();

        let snap = metrics.snapshot();
        assert_eq!(snap.samples_pushed, 0);
        assert_eq!(snap.gate_resumes, 0);
    }

    #[test]
    fn snapshot_serializes_with_camel_case_fields() {
        let metrics = OutputMetrics::default();
        metrics.samples_evicted.fetch_add(3, Ordering::Relaxed);

        let json = serde_json::to_value(metrics.snapshot()).expect("serialize snapshot");
        assert_eq!(json["samplesEvicted"], 3);
        assert_eq!(json["blocksPulled"], 0);
    }
}
