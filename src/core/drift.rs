//! Drift correction against the combined voice track.
//!
//! The engine clock is wall-clock driven while the voice track plays through
//! its own buffered pipeline, so the two slowly diverge. The voice track is
//! the reference: the viewer notices lips and captions falling out of step
//! with speech long before they notice a timeline jump. When the divergence
//! exceeds the threshold, the clock snaps to the audio position in one
//! assignment and active videos are reseeked; there is no gradual
//! rate-matching.

use std::time::{Duration, Instant};

use log::debug;

/// Periodic audio/clock comparator. Owns only its own cadence state.
#[derive(Debug)]
pub struct DriftCorrector {
    /// Divergence that triggers a snap, in seconds.
    threshold: f64,
    /// Minimum spacing between checks.
    interval: Duration,
    last_check: Option<Instant>,
    corrections: u64,
}

impl DriftCorrector {
    pub fn new(threshold: f64, interval: Duration) -> Self {
        Self {
            threshold,
            interval,
            last_check: None,
            corrections: 0,
        }
    }

    /// Compare `clock` with the audio position if a check is due. Returns
    /// the position to snap the clock to when the divergence exceeds the
    /// threshold. `audio` is `None` while the voice track is not ready,
    /// which skips the check without consuming the cadence.
    pub fn maybe_correct(&mut self, now: Instant, audio: Option<f64>, clock: f64) -> Option<f64> {
        if let Some(last) = self.last_check {
            if now.duration_since(last) < self.interval {
                return None;
            }
        }
        let audio = audio?;
        self.last_check = Some(now);

        let delta = audio - clock;
        if delta.abs() > self.threshold {
            self.corrections += 1;
            debug!(
                "drift {:+.3}s exceeds {:.3}s, snapping clock {:.3} -> {:.3}",
                delta, self.threshold, clock, audio
            );
            Some(audio)
        } else {
            None
        }
    }

    /// Forget the cadence so the next check runs immediately (seek/stop).
    pub fn reset(&mut self) {
        self.last_check = None;
    }

    /// Total snaps performed this session (debug overlay).
    pub fn corrections(&self) -> u64 {
        self.corrections
    }
}
