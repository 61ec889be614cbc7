//! Timeline controller: the single writer of playback state.
//!
//! Everything that mutates the session funnels through here, on one thread:
//! user gestures call the transport methods, and the host loop calls
//! [`TimelineController::tick`] at the frame rate. A tick drains load
//! completions, advances the clock by the wall-clock delta since the last
//! tick, resolves the active segment, polls the pending activation, and runs
//! the drift check. Collaborators (scheduler, pool, drift corrector, mixer)
//! report; only the controller acts.
//!
//! The clock is delta-based rather than frame-counted, so a stalled or
//! throttled host loop produces a late-but-correct clock instead of a slow
//! one.

use std::time::Instant;

use log::{debug, info, warn};

use crate::config::EngineConfig;
use crate::core::drift::DriftCorrector;
use crate::core::events::MediaEventQueue;
use crate::core::loader::MediaLoader;
use crate::core::manifest::Manifest;
use crate::core::media::LoadState;
use crate::core::mixer::{Track, VolumeMixer};
use crate::core::pool::{ActiveVisual, MediaResourcePool};
use crate::core::scheduler::SegmentScheduler;

/// Transport state. `Stopped` is both the initial and the terminal state;
/// a stopped session can be replayed from the top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

/// Session counters for the debug overlay.
#[derive(Debug, Default, Clone, Copy)]
pub struct DebugStats {
    pub ticks: u64,
    pub transitions: u64,
    /// Segments that lost at least one resource to a load failure/timeout.
    pub degraded: u64,
    pub drift_corrections: u64,
}

pub struct TimelineController {
    manifest: Manifest,
    scheduler: SegmentScheduler,
    pool: MediaResourcePool,
    events: MediaEventQueue,
    drift: DriftCorrector,
    pub mixer: VolumeMixer,
    state: PlaybackState,
    /// Master clock, absolute timeline seconds.
    current_time: f64,
    last_tick: Option<Instant>,
    active_segment: Option<usize>,
    /// A seek landed in a segment whose resources are not started yet; the
    /// clock holds at the target until the activation settles.
    pending_seek: bool,
    lookahead: usize,
    stats: DebugStats,
}

impl TimelineController {
    pub fn new(manifest: Manifest, loader: Box<dyn MediaLoader>, config: &EngineConfig) -> Self {
        let events = MediaEventQueue::new();
        let scheduler = SegmentScheduler::new(&manifest);
        let pool =
            MediaResourcePool::new(&manifest, loader, events.sender(), config.load_timeout());
        info!(
            "timeline ready: {} segments, {:.2}s",
            manifest.segments.len(),
            manifest.total_duration
        );
        Self {
            manifest,
            scheduler,
            pool,
            events,
            drift: DriftCorrector::new(config.drift_threshold_secs, config.drift_interval()),
            mixer: VolumeMixer::new(),
            state: PlaybackState::Stopped,
            current_time: 0.0,
            last_tick: None,
            active_segment: None,
            pending_seek: false,
            lookahead: config.lookahead_segments,
            stats: DebugStats::default(),
        }
    }

    // ========== Transport ==========

    /// Start or resume playback. From `Stopped` the session plays from the
    /// current clock (0 unless a seek moved it); segment activation happens
    /// on the next tick through the scheduler.
    pub fn play(&mut self, now: Instant) {
        match self.state {
            PlaybackState::Playing => {}
            PlaybackState::Paused => {
                info!("resume at {:.2}s", self.current_time);
                self.state = PlaybackState::Playing;
                self.last_tick = Some(now);
                self.pool.resume_active(self.current_time, now);
                self.drift.reset();
            }
            PlaybackState::Stopped => {
                info!("play from {:.2}s", self.current_time);
                self.state = PlaybackState::Playing;
                self.last_tick = Some(now);
                self.pool.prepare_audio(now);
            }
        }
    }

    /// Freeze the clock and pause every active element in place.
    pub fn pause(&mut self, now: Instant) {
        if self.state != PlaybackState::Playing {
            return;
        }
        // Fold the partial frame since the last tick into the clock so the
        // pause lands exactly where the viewer saw it.
        if !self.pending_seek {
            if let Some(last) = self.last_tick {
                self.current_time += now.duration_since(last).as_secs_f64();
            }
        }
        info!("pause at {:.2}s", self.current_time);
        self.state = PlaybackState::Paused;
        self.pool.pause_active(now);
        self.pool.ensure_audio(self.current_time, false, now);
        self.last_tick = Some(now);
    }

    /// Tear the session down and rewind to the top. Valid from any state.
    pub fn stop(&mut self, now: Instant) {
        info!("stop");
        self.pool.stop_all(now);
        self.scheduler.reset();
        self.drift.reset();
        self.state = PlaybackState::Stopped;
        self.current_time = 0.0;
        self.last_tick = None;
        self.active_segment = None;
        self.pending_seek = false;
    }

    /// Jump the clock to `t` (clamped to the programme range), in any state.
    /// Crossing into another segment swaps activations; within the same
    /// segment the active elements are snapped in place.
    pub fn seek(&mut self, t: f64, now: Instant) {
        let t = t.clamp(0.0, self.manifest.total_duration);
        debug!("seek {:.2}s -> {:.2}s", self.current_time, t);
        self.current_time = t;
        // Re-anchor the delta clock; time spent before the seek must not
        // leak into the first frame after it.
        if self.last_tick.is_some() {
            self.last_tick = Some(now);
        }
        self.drift.reset();

        let res = self.scheduler.resolve(t);
        if res.transitioned {
            self.apply_transition(res.active, now);
            // Hold the clock until the target segment's media is up.
            self.pending_seek = res.active.is_some();
        } else {
            self.pool.reseek_videos(t, now);
        }
        self.pool.seek_audio(t, now);
    }

    /// Replace the programme with a freshly fetched manifest: full teardown
    /// and rebuild. Volume settings survive the reload.
    pub fn load_manifest(
        &mut self,
        manifest: Manifest,
        loader: Box<dyn MediaLoader>,
        config: &EngineConfig,
        now: Instant,
    ) {
        self.stop(now);
        let mut next = Self::new(manifest, loader, config);
        next.mixer = self.mixer.clone();
        next.mixer.mark_dirty();
        *self = next;
    }

    // ========== Tick ==========

    /// One frame of the engine. `now` is the only clock source.
    pub fn tick(&mut self, now: Instant) {
        self.stats.ticks += 1;

        // 1. Load completions queued by fetch threads land on handles here,
        //    and nowhere else.
        for ev in self.events.drain() {
            self.pool.apply_event(ev);
        }

        // Stopped sessions have no active segment and no clock; nothing
        // below applies until play().
        if self.state == PlaybackState::Stopped {
            return;
        }

        // 2. Advance the clock by the wall-clock delta.
        let dt = self
            .last_tick
            .map(|last| now.duration_since(last).as_secs_f64())
            .unwrap_or(0.0);
        self.last_tick = Some(now);
        if self.state == PlaybackState::Playing && !self.pending_seek {
            self.current_time += dt;
        }

        // 3. End of programme.
        if self.state == PlaybackState::Playing && self.current_time >= self.manifest.total_duration
        {
            info!("programme complete");
            self.stop(now);
            return;
        }

        // 4. Segment resolution; transitions swap activations.
        let res = self.scheduler.resolve(self.current_time);
        if res.transitioned {
            self.apply_transition(res.active, now);
        }

        // 5. Activation progress: start what came ready, degrade what
        //    didn't. While a seek is settling, elements come up paused at
        //    the target so nothing runs ahead of the held clock.
        let playing = self.state == PlaybackState::Playing;
        let transport = playing && !self.pending_seek;
        let report = self.pool.poll_activation(self.current_time, transport, now);
        for err in &report.failed {
            warn!("degraded: {}", err);
            self.stats.degraded += 1;
        }

        // 6. Keep the voice track transport in step with the engine.
        self.pool.ensure_audio(self.current_time, transport, now);

        // 7. A settled seek releases the clock and launches everything
        //    together from the target.
        if self.pending_seek && self.pool.activation_settled(now) {
            self.pending_seek = false;
            self.drift.reset();
            if playing {
                self.pool.resume_active(self.current_time, now);
                self.pool.ensure_audio(self.current_time, true, now);
            }
        }

        // 8. Gains, when a value changed or new elements started at the
        //    default gain.
        if self.mixer.take_dirty() || !report.started.is_empty() {
            self.pool.apply_gains(&self.mixer);
        }

        // 9. Drift check against the voice track.
        if playing && !self.pending_seek {
            let audio = self.pool.audio_position(now);
            if let Some(snap) = self.drift.maybe_correct(now, audio, self.current_time) {
                self.current_time = snap;
                self.pool.reseek_videos(snap, now);
                self.stats.drift_corrections = self.drift.corrections();
                // The snap can cross a boundary; resolve again so the
                // activation swap happens on this tick, not the next.
                let res = self.scheduler.resolve(self.current_time);
                if res.transitioned {
                    self.apply_transition(res.active, now);
                }
            }
        }
    }

    /// Swap segment activations after a transition and preload upcoming
    /// segments.
    fn apply_transition(&mut self, next: Option<usize>, now: Instant) {
        if let Some(prev) = self.active_segment {
            if Some(prev) != next {
                self.pool.deactivate(prev, now);
            }
        }
        if let Some(idx) = next {
            debug!(
                "segment {} active: {}",
                idx, self.manifest.segments[idx].display_name
            );
            self.pool.begin_activation(idx, now);
            for ahead in idx + 1..=idx + self.lookahead {
                if ahead < self.manifest.segments.len() {
                    self.pool.prepare_index(ahead, now);
                }
            }
            self.stats.transitions += 1;
        }
        self.active_segment = next;
        self.mixer.mark_dirty();
    }

    // ========== Introspection (read-only view for the UI) ==========

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn total_duration(&self) -> f64 {
        self.manifest.total_duration
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn active_segment(&self) -> Option<usize> {
        self.active_segment
    }

    pub fn seeking(&self) -> bool {
        self.pending_seek
    }

    pub fn visual(&self, now: Instant) -> ActiveVisual {
        self.pool.visual(now)
    }

    pub fn overlay(&self) -> Option<String> {
        self.pool.overlay()
    }

    pub fn active_ids(&self) -> Vec<String> {
        self.pool.active_ids()
    }

    pub fn audio_state(&self) -> LoadState {
        self.pool.audio_state()
    }

    pub fn volume(&self, track: Track) -> f32 {
        self.mixer.gain(track)
    }

    pub fn stats(&self) -> DebugStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loader::InstantLoader;
    use crate::core::manifest::{RawCombinedAudio, RawManifest, RawMedia, RawSegment};
    use std::time::Duration;

    fn raw_segment(name: &str, duration: f64, video: Option<String>) -> RawSegment {
        let media = video
            .map(|v| {
                vec![RawMedia {
                    video: Some(v.clone()),
                    image: None,
                    path: v,
                    kind: None,
                }]
            })
            .unwrap_or_default();
        RawSegment {
            segment_type: "news".to_string(),
            display_name: name.to_string(),
            audio_file: String::new(),
            audio_path: String::new(),
            script: String::new(),
            duration,
            language: None,
            media,
        }
    }

    fn manifest(durations: &[f64]) -> Manifest {
        let total: f64 = durations.iter().sum();
        let segments = durations
            .iter()
            .enumerate()
            .map(|(i, d)| {
                raw_segment(&format!("Segment {}", i), *d, Some(format!("media/{}.mp4", i)))
            })
            .collect();
        Manifest::load(
            RawManifest {
                individual_segments: segments,
                combined_audio: RawCombinedAudio {
                    combined_file: "broadcast.mp3".to_string(),
                    combined_path: "/generated/broadcast.mp3".to_string(),
                    total_duration: total,
                },
            },
            0.5,
        )
        .unwrap()
    }

    fn controller(durations: &[f64]) -> TimelineController {
        TimelineController::new(
            manifest(durations),
            Box::new(InstantLoader),
            &EngineConfig::default(),
        )
    }

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    #[test]
    fn test_pause_freezes_and_resume_continues() {
        let mut c = controller(&[15.456, 40.0, 139.864]);
        let t0 = Instant::now();
        c.play(t0);
        c.tick(t0);
        c.tick(t0 + secs(2.0));
        assert!((c.current_time() - 2.0).abs() < 1e-9);
        assert_eq!(c.state(), PlaybackState::Playing);

        c.pause(t0 + secs(2.0));
        assert_eq!(c.state(), PlaybackState::Paused);

        // Ticks keep arriving while paused (idle UI rate); the clock and
        // audio hold still.
        c.tick(t0 + secs(5.0));
        c.tick(t0 + secs(9.0));
        assert!((c.current_time() - 2.0).abs() < 1e-9);
        assert!(c.active_ids().is_empty());

        c.play(t0 + secs(10.0));
        c.tick(t0 + secs(10.5));
        assert!((c.current_time() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_first_tick_activates_first_segment_and_preloads_next() {
        let mut c = controller(&[10.0, 10.0, 10.0]);
        let t0 = Instant::now();
        c.play(t0);
        c.tick(t0);
        assert_eq!(c.active_segment(), Some(0));
        // Lookahead of one: segment 1 already loading/ready, segment 2 not.
        c.tick(t0 + secs(0.1));
        assert_eq!(c.pool.load_state("media/1.mp4"), Some(LoadState::Ready));
        assert_eq!(c.pool.load_state("media/2.mp4"), Some(LoadState::Unloaded));
    }

    #[test]
    fn test_transition_swaps_active_elements() {
        let mut c = controller(&[10.0, 10.0]);
        let t0 = Instant::now();
        c.play(t0);
        c.tick(t0);
        c.tick(t0 + secs(0.1));
        assert!(c.active_ids().contains(&"media/0.mp4".to_string()));

        c.tick(t0 + secs(10.5));
        assert_eq!(c.active_segment(), Some(1));
        let ids = c.active_ids();
        assert!(ids.contains(&"media/1.mp4".to_string()));
        assert!(!ids.contains(&"media/0.mp4".to_string()));
        assert_eq!(c.stats().transitions, 2);
    }

    #[test]
    fn test_seek_lands_in_segment_and_clock_follows() {
        let mut c = controller(&[15.456, 40.0, 139.864]);
        let t0 = Instant::now();
        c.play(t0);
        c.tick(t0);

        c.seek(120.0, t0 + secs(1.0));
        assert_eq!(c.active_segment(), Some(2));
        assert!((c.current_time() - 120.0).abs() < 1e-9);

        // The activation settles on the next tick (loads are instant); the
        // clock holds at the target through it, then advances.
        c.tick(t0 + secs(1.1));
        assert!((c.current_time() - 120.0).abs() < 1e-9);
        assert!(!c.seeking());
        c.tick(t0 + secs(2.1));
        assert!((c.current_time() - 121.0).abs() < 1e-9);
    }

    #[test]
    fn test_seek_then_pause_then_play_preserves_clock() {
        let mut c = controller(&[15.456, 40.0, 139.864]);
        let t0 = Instant::now();
        c.play(t0);
        c.tick(t0);

        // Seek within the active segment, pause a frame later, resume after
        // a long idle. The clock must stay at the seek target; neither the
        // second before the seek nor the idle time may leak in.
        c.seek(12.0, t0 + secs(1.0));
        c.pause(t0 + secs(1.003));
        c.play(t0 + secs(4.0));
        c.tick(t0 + secs(4.0));
        assert!((c.current_time() - 12.0).abs() < 0.010);
        assert_eq!(c.active_segment(), Some(0));

        // And it advances from the target afterwards.
        c.tick(t0 + secs(5.0));
        assert!((c.current_time() - 13.0).abs() < 0.010);
    }

    #[test]
    fn test_seek_clamps_to_programme_range() {
        let mut c = controller(&[10.0, 10.0]);
        let t0 = Instant::now();
        c.seek(-5.0, t0);
        assert_eq!(c.current_time(), 0.0);
        c.seek(500.0, t0);
        assert_eq!(c.current_time(), 20.0);
    }

    #[test]
    fn test_drift_snap_realigns_clock_to_audio() {
        let mut c = controller(&[100.0]);
        let t0 = Instant::now();
        c.play(t0);
        c.tick(t0);
        let t1 = t0 + secs(1.0);
        c.tick(t1); // first drift check: in sync, cadence armed

        // The audio pipeline runs 300ms ahead of the engine clock.
        let skewed = c.current_time() + 0.3;
        c.pool.seek_audio(skewed, t1);

        let t2 = t1 + secs(0.7);
        c.tick(t2);
        let audio = c.pool.audio_position(t2).unwrap();
        assert!((c.current_time() - audio).abs() < 1e-9);
        assert_eq!(c.stats().drift_corrections, 1);

        // Sub-threshold divergence is left alone.
        let t3 = t2 + secs(0.7);
        c.tick(t3);
        assert_eq!(c.stats().drift_corrections, 1);
    }

    #[test]
    fn test_programme_end_stops_session() {
        let mut c = controller(&[1.0, 1.0]);
        let t0 = Instant::now();
        c.play(t0);
        c.tick(t0);
        c.tick(t0 + secs(2.5));
        assert_eq!(c.state(), PlaybackState::Stopped);
        assert_eq!(c.current_time(), 0.0);
        assert_eq!(c.active_segment(), None);
        assert!(c.active_ids().is_empty());
    }

    #[test]
    fn test_stopped_session_replays_from_top() {
        let mut c = controller(&[5.0, 5.0]);
        let t0 = Instant::now();
        c.play(t0);
        c.tick(t0);
        c.tick(t0 + secs(3.0));
        c.stop(t0 + secs(3.0));

        let t1 = t0 + secs(60.0);
        c.play(t1);
        c.tick(t1);
        assert_eq!(c.state(), PlaybackState::Playing);
        assert_eq!(c.active_segment(), Some(0));
        assert!(c.current_time() < 1e-9);
    }

    #[test]
    fn test_reload_swaps_programme_and_keeps_volumes() {
        let mut c = controller(&[10.0]);
        let t0 = Instant::now();
        c.mixer.set_gain(Track::Master, 0.5);
        c.play(t0);
        c.tick(t0);

        c.load_manifest(
            manifest(&[5.0, 5.0]),
            Box::new(InstantLoader),
            &EngineConfig::default(),
            t0 + secs(1.0),
        );
        assert_eq!(c.state(), PlaybackState::Stopped);
        assert_eq!(c.manifest().segments.len(), 2);
        assert!((c.total_duration() - 10.0).abs() < 1e-9);
        assert!((c.volume(Track::Master) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_ticks_while_stopped_do_nothing() {
        let mut c = controller(&[10.0]);
        let t0 = Instant::now();
        c.tick(t0);
        c.tick(t0 + secs(1.0));
        assert_eq!(c.state(), PlaybackState::Stopped);
        assert_eq!(c.active_segment(), None);
        assert!(c.active_ids().is_empty());
    }

    #[test]
    fn test_mixer_gains_reach_elements_after_change() {
        let mut c = controller(&[10.0]);
        let t0 = Instant::now();
        c.play(t0);
        c.tick(t0);
        c.tick(t0 + secs(0.1));

        c.mixer.set_gain(Track::Master, 0.5);
        c.tick(t0 + secs(0.2));
        // Video gain defaults to 0.6; effective is 0.3 under the new master.
        let ids = c.active_ids();
        assert!(ids.contains(&"media/0.mp4".to_string()));
        // The pool applied the effective gain on this tick.
        assert!((c.mixer.effective(Track::Video) - 0.3).abs() < 1e-6);
    }
}
