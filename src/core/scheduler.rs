//! Segment scheduler: resolves the active segment for a clock time.
//!
//! Resolution runs every frame, so lookup is a binary search over the
//! precomputed segment start times (O(log n)). Intervals are half-open
//! `[start, end)` — a time exactly on a boundary belongs to the *later*
//! segment — except the final segment, whose range is closed at
//! `total_duration`.
//!
//! The scheduler never mutates playback state: it reports `{active,
//! transitioned}` and the controller acts on it.

use crate::core::manifest::Manifest;

/// Result of one per-tick resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub active: Option<usize>,
    /// True when `active` differs from the previously resolved segment.
    /// Transitions are the only trigger for media activation/deactivation.
    pub transitioned: bool,
}

/// Binary-search scheduler over the static segment table.
#[derive(Debug, Clone)]
pub struct SegmentScheduler {
    /// Segment start times, ascending (starts[0] == 0.0).
    starts: Vec<f64>,
    total: f64,
    /// Previously resolved segment; `None` means never resolved.
    last: Option<Option<usize>>,
}

impl SegmentScheduler {
    pub fn new(manifest: &Manifest) -> Self {
        Self {
            starts: manifest.segments.iter().map(|s| s.start_time).collect(),
            total: manifest.total_duration,
            last: None,
        }
    }

    /// Pure lookup: which segment is active at `t`, if any.
    pub fn resolve_at(&self, t: f64) -> Option<usize> {
        if self.starts.is_empty() || t < 0.0 || t > self.total {
            return None;
        }
        if t == self.total {
            // Final boundary is closed.
            return Some(self.starts.len() - 1);
        }
        // partition_point gives the first start > t; the segment owning t is
        // the one before it. starts[0] == 0.0, so the index is always >= 1.
        let idx = self.starts.partition_point(|s| *s <= t);
        Some(idx - 1)
    }

    /// Resolve and detect a transition against the previous resolution.
    pub fn resolve(&mut self, t: f64) -> Resolution {
        let active = self.resolve_at(t);
        let transitioned = match self.last {
            None => active.is_some(),
            Some(prev) => prev != active,
        };
        self.last = Some(active);
        Resolution {
            active,
            transitioned,
        }
    }

    /// Forget the previous resolution (used by `stop`), so the next
    /// `resolve` reports a fresh transition.
    pub fn reset(&mut self) {
        self.last = None;
    }

    pub fn total_duration(&self) -> f64 {
        self.total
    }
}
