//! Fill-level hysteresis gate.
//!
//! ## Algorithm
//!
//! 1. After every producer push, the endpoint reports ring occupancy here.
//! 2. Occupancy ≥ [`RESUME_THRESHOLD`] → `Playing`.
//! 3. Occupancy < [`PAUSE_THRESHOLD`] → `Paused`, giving the buffer a chance
//!    to refill before the hardware drains it dry.
//! 4. Anywhere in between, the current state sticks — the wide band keeps the
//!    stream from toggling rapidly around a single threshold.
//!
//! The gate only decides; the endpoint performs the sink pause/resume side
//! effect, outside the ring lock.

use serde::{Deserialize, Serialize};

/// Occupancy at or above which playback resumes. Half-full leaves a full
/// latency window of refill headroom.
pub const RESUME_THRESHOLD: f32 = 0.5;

/// Occupancy below which playback pauses.
pub const PAUSE_THRESHOLD: f32 = 0.1;

/// Whether the hardware stream is currently consuming samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// Stream callback suspended; the ring is pre-filling.
    Paused,
    /// Stream callback running.
    Playing,
}

/// Hysteresis state machine deciding `Paused` ↔ `Playing` from occupancy.
///
/// Starts `Paused`: playback begins only once the ring has pre-filled past
/// the resume threshold at least once.
#[derive(Debug, Clone)]
pub struct PlaybackGate {
    state: PlaybackState,
}

impl PlaybackGate {
    pub fn new() -> Self {
        Self {
            state: PlaybackState::Paused,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Evaluate the transition rule for the given occupancy.
    ///
    /// Returns `Some(new_state)` only on a state change; re-asserting the
    /// current state is a no-op so the caller's sink control stays idempotent.
    pub fn update(&mut self, occupancy: f32) -> Option<PlaybackState> {
        let target = if occupancy >= RESUME_THRESHOLD {
            PlaybackState::Playing
        } else if occupancy < PAUSE_THRESHOLD {
            PlaybackState::Paused
        } else {
            return None;
        };
        self.force(target).then_some(target)
    }

    /// Set the state directly (external pause/resume override).
    ///
    /// Returns whether the state changed. Idempotent.
    pub fn force(&mut self, state: PlaybackState) -> bool {
        if self.state == state {
            return false;
        }
        self.state = state;
        true
    }
}

impl Default for PlaybackGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_paused() {
        assert_eq!(PlaybackGate::new().state(), PlaybackState::Paused);
    }

    #[test]
    fn monotonic_fill_resumes_exactly_once() {
        let mut gate = PlaybackGate::new();
        let mut transitions = 0;
        for step in 0..=100 {
            if gate.update(step as f32 / 100.0).is_some() {
                transitions += 1;
            }
        }
        assert_eq!(transitions, 1);
        assert_eq!(gate.state(), PlaybackState::Playing);
    }

    #[test]
    fn resumes_at_exactly_half_full() {
        let mut gate = PlaybackGate::new();
        assert_eq!(gate.update(0.49), None);
        assert_eq!(gate.update(0.5), Some(PlaybackState::Playing));
    }

    #[test]
    fn oscillation_inside_the_band_never_transitions() {
        // From Paused: the band is sticky.
        let mut gate = PlaybackGate::new();
        for occupancy in [0.1, 0.3, 0.49, 0.12, 0.45, 0.2] {
            assert_eq!(gate.update(occupancy), None);
        }
        assert_eq!(gate.state(), PlaybackState::Paused);

        // From Playing: equally sticky.
        gate.update(0.6);
        for occupancy in [0.49, 0.11, 0.3, 0.1, 0.48] {
            assert_eq!(gate.update(occupancy), None);
        }
        assert_eq!(gate.state(), PlaybackState::Playing);
    }

    #[test]
    fn pauses_below_the_low_watermark() {
        let mut gate = PlaybackGate::new();
        gate.update(0.8);
        assert_eq!(gate.update(0.1), None); // exactly 0.1 is still in-band
        assert_eq!(gate.update(0.09), Some(PlaybackState::Paused));
        // Further starvation is a no-op.
        assert_eq!(gate.update(0.0), None);
    }

    #[test]
    fn force_is_idempotent_and_reports_changes() {
        let mut gate = PlaybackGate::new();
        assert!(!gate.force(PlaybackState::Paused));
        assert!(gate.force(PlaybackState::Playing));
        assert!(!gate.force(PlaybackState::Playing));
        assert!(gate.force(PlaybackState::Paused));
    }

    #[test]
    fn gate_can_repause_and_resume_across_a_session() {
        let mut gate = PlaybackGate::new();
        assert_eq!(gate.update(0.6), Some(PlaybackState::Playing));
        assert_eq!(gate.update(0.05), Some(PlaybackState::Paused));
        assert_eq!(gate.update(0.55), Some(PlaybackState::Playing));
    }
}
