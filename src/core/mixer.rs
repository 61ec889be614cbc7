//! Volume mixer: independent per-track gains under a master gain.
//!
//! The effective gain of any element is `track_gain * master_gain`, a pure
//! function of the three stored values. The pool reapplies gains whenever a
//! value changes or the active element set changes; nothing is persisted
//! across sessions.

use log::trace;

/// Mixer track. `News` is the combined voice track, `Video` covers embedded
/// audio of video elements, `Master` scales both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Track {
    News,
    Video,
    Master,
}

#[derive(Debug, Clone)]
pub struct VolumeMixer {
    news: f32,
    video: f32,
    master: f32,
    dirty: bool,
}

impl Default for VolumeMixer {
    fn default() -> Self {
        Self {
            news: 1.0,
            video: 0.6,
            master: 1.0,
            dirty: true,
        }
    }
}

impl VolumeMixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a track gain, clamped to `[0, 1]`. Marks the mixer dirty so the
    /// controller reapplies gains on the next tick.
    pub fn set_gain(&mut self, track: Track, value: f32) {
        let value = value.clamp(0.0, 1.0);
        let slot = match track {
            Track::News => &mut self.news,
            Track::Video => &mut self.video,
            Track::Master => &mut self.master,
        };
        if (*slot - value).abs() > f32::EPSILON {
            *slot = value;
            self.dirty = true;
            trace!("gain {:?} -> {:.2}", track, value);
        }
    }

    pub fn gain(&self, track: Track) -> f32 {
        match track {
            Track::News => self.news,
            Track::Video => self.video,
            Track::Master => self.master,
        }
    }

    /// Effective gain applied to elements of a track: `track * master`.
    pub fn effective(&self, track: Track) -> f32 {
        match track {
            Track::Master => self.master,
            t => self.gain(t) * self.master,
        }
    }

    /// Mark dirty without a gain change (active set changed).
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Consume the dirty flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_gain_is_track_times_master() {
        let mut m = VolumeMixer::new();
        m.set_gain(Track::News, 0.8);
        m.set_gain(Track::Video, 0.5);
        m.set_gain(Track::Master, 0.5);
        assert!((m.effective(Track::News) - 0.4).abs() < 1e-6);
        assert!((m.effective(Track::Video) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_gain_clamped_to_unit_range() {
        let mut m = VolumeMixer::new();
        m.set_gain(Track::News, 1.7);
        assert_eq!(m.gain(Track::News), 1.0);
        m.set_gain(Track::News, -0.3);
        assert_eq!(m.gain(Track::News), 0.0);
    }

    #[test]
    fn test_dirty_flag_lifecycle() {
        let mut m = VolumeMixer::new();
        assert!(m.take_dirty()); // fresh mixer wants one initial apply
        assert!(!m.take_dirty());

        m.set_gain(Track::Master, 0.9);
        assert!(m.take_dirty());

        // Setting the same value again is not a change.
        m.set_gain(Track::Master, 0.9);
        assert!(!m.take_dirty());

        m.mark_dirty();
        assert!(m.take_dirty());
    }
}
