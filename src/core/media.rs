//! Media element abstraction.
//!
//! The pool owns platform media elements behind the [`MediaElement`] trait;
//! collaborators only ever receive read-only signals. [`ClockElement`] is the
//! engine's element: once playing it free-runs against the wall clock, like a
//! platform audio/video pipeline that buffers and advances on its own. All
//! positions are absolute timeline seconds.

use std::time::Instant;

use crate::core::manifest::MediaKind;

/// Resource load lifecycle. Transitions: `Unloaded -> Loading -> Ready |
/// Failed`. Handles are never reused across ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    Loading,
    Ready,
    Failed,
}

/// A playable element owned by the media pool.
pub trait MediaElement: Send {
    fn kind(&self) -> MediaKind;
    fn play(&mut self, now: Instant);
    fn pause(&mut self, now: Instant);
    fn seek(&mut self, position: f64, now: Instant);
    /// Current playback position in timeline seconds.
    fn position(&self, now: Instant) -> f64;
    fn set_gain(&mut self, gain: f32);
    fn gain(&self) -> f32;
    fn is_playing(&self) -> bool;
    /// Whether this element produces audio (videos and audio tracks do).
    fn is_audible(&self) -> bool {
        matches!(self.kind(), MediaKind::Video | MediaKind::AudioTrack)
    }
}

/// Wall-clock-driven element: `position = base + elapsed-since-anchor`.
#[derive(Debug, Clone)]
pub struct ClockElement {
    kind: MediaKind,
    /// Position at the last play/pause/seek.
    base: f64,
    /// Set while playing; elapsed time since this instant advances `base`.
    anchor: Option<Instant>,
    gain: f32,
}

impl ClockElement {
    pub fn new(kind: MediaKind) -> Self {
        Self {
            kind,
            base: 0.0,
            anchor: None,
            gain: 1.0,
        }
    }
}

impl MediaElement for ClockElement {
    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn play(&mut self, now: Instant) {
        if self.anchor.is_none() {
            self.anchor = Some(now);
        }
    }

    fn pause(&mut self, now: Instant) {
        self.base = self.position(now);
        self.anchor = None;
    }

    fn seek(&mut self, position: f64, now: Instant) {
        self.base = position;
        if self.anchor.is_some() {
            self.anchor = Some(now);
        }
    }

    fn position(&self, now: Instant) -> f64 {
        match self.anchor {
            Some(anchor) => self.base + now.duration_since(anchor).as_secs_f64(),
            None => self.base,
        }
    }

    fn set_gain(&mut self, gain: f32) {
        self.gain = gain.clamp(0.0, 1.0);
    }

    fn gain(&self) -> f32 {
        self.gain
    }

    fn is_playing(&self) -> bool {
        self.anchor.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_element_free_runs_while_playing() {
        let t0 = Instant::now();
        let mut el = ClockElement::new(MediaKind::AudioTrack);
        assert_eq!(el.position(t0), 0.0);

        el.play(t0);
        let t1 = t0 + Duration::from_millis(2500);
        assert!((el.position(t1) - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_pause_freezes_position() {
        let t0 = Instant::now();
        let mut el = ClockElement::new(MediaKind::Video);
        el.play(t0);
        let t1 = t0 + Duration::from_secs(3);
        el.pause(t1);
        assert!(!el.is_playing());

        let t2 = t1 + Duration::from_secs(10);
        assert!((el.position(t2) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_seek_while_playing_reanchors() {
        let t0 = Instant::now();
        let mut el = ClockElement::new(MediaKind::Video);
        el.play(t0);
        let t1 = t0 + Duration::from_secs(5);
        el.seek(42.0, t1);
        let t2 = t1 + Duration::from_secs(1);
        assert!((el.position(t2) - 43.0).abs() < 1e-9);
    }

    #[test]
    fn test_gain_clamped() {
        let mut el = ClockElement::new(MediaKind::AudioTrack);
        el.set_gain(1.5);
        assert_eq!(el.gain(), 1.0);
        el.set_gain(-0.2);
        assert_eq!(el.gain(), 0.0);
    }

    #[test]
    fn test_audibility() {
        assert!(ClockElement::new(MediaKind::AudioTrack).is_audible());
        assert!(ClockElement::new(MediaKind::Video).is_audible());
        assert!(!ClockElement::new(MediaKind::Image).is_audible());
    }
}
