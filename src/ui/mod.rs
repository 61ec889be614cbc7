//! UI binding: a read-only view-model and a gesture funnel.
//!
//! The host UI never touches engine internals. Each frame it renders a
//! [`TimelineView`] snapshot, and every interaction becomes a [`Gesture`]
//! applied through [`apply`] — which keeps the controller the single writer
//! of playback state regardless of what toolkit sits on top.

use std::time::Instant;

use log::debug;

use crate::core::controller::{DebugStats, PlaybackState, TimelineController};
use crate::core::manifest::SegmentKind;
use crate::core::media::LoadState;
use crate::core::mixer::Track;
use crate::core::pool::ActiveVisual;

/// One row of the segment playlist.
#[derive(Debug, Clone)]
pub struct PlaylistRow {
    pub index: usize,
    pub title: String,
    pub kind: SegmentKind,
    pub start_time: f64,
    pub duration: f64,
    pub active: bool,
}

/// Immutable per-frame snapshot for rendering.
#[derive(Debug, Clone)]
pub struct TimelineView {
    pub state: PlaybackState,
    pub current_time: f64,
    pub total_duration: f64,
    /// Clock as a fraction of the programme, for the progress bar.
    pub progress: f64,
    pub clock_text: String,
    pub active_segment: Option<usize>,
    pub segment_title: Option<String>,
    pub visual: ActiveVisual,
    pub overlay: Option<String>,
    /// True while a seek holds the clock waiting for media.
    pub seeking: bool,
    pub audio_state: LoadState,
    pub volumes: [f32; 3],
    pub playlist: Vec<PlaylistRow>,
    pub debug: Option<DebugStats>,
}

/// A user interaction, toolkit-agnostic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    Play,
    Pause,
    Stop,
    /// Click on the progress bar at `fraction` of its width.
    TimelineClick { fraction: f64 },
    /// Click on playlist row `index`: jump to that segment's start.
    PlaylistClick { index: usize },
    /// Volume slider, 0..=100.
    SetVolume { track: Track, percent: u8 },
    ToggleDebug,
    /// Fetch a fresh manifest and rebuild the session.
    Reload,
}

/// What the host loop should do after a gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureOutcome {
    Handled,
    /// The session must be rebuilt from a fresh manifest; the engine cannot
    /// do that in place.
    ReloadRequested,
}

/// UI-local flags that are not playback state.
#[derive(Debug, Default)]
pub struct UiState {
    pub show_debug: bool,
}

/// Render `seconds` as `M:SS` (hours folded into minutes, matching
/// broadcast rundown clocks).
pub fn format_clock(seconds: f64) -> String {
    let s = seconds.max(0.0) as u64;
    format!("{}:{:02}", s / 60, s % 60)
}

/// Build the per-frame snapshot.
pub fn view(ctrl: &TimelineController, ui: &UiState, now: Instant) -> TimelineView {
    let total = ctrl.total_duration();
    let t = ctrl.current_time();
    let active = ctrl.active_segment();
    let playlist = ctrl
        .manifest()
        .segments
        .iter()
        .enumerate()
        .map(|(i, seg)| PlaylistRow {
            index: i,
            title: seg.display_name.clone(),
            kind: seg.kind,
            start_time: seg.start_time,
            duration: seg.duration,
            active: active == Some(i),
        })
        .collect();

    TimelineView {
        state: ctrl.state(),
        current_time: t,
        total_duration: total,
        progress: if total > 0.0 { (t / total).clamp(0.0, 1.0) } else { 0.0 },
        clock_text: format!("{} / {}", format_clock(t), format_clock(total)),
        active_segment: active,
        segment_title: active.map(|i| ctrl.manifest().segments[i].display_name.clone()),
        visual: ctrl.visual(now),
        overlay: ctrl.overlay(),
        seeking: ctrl.seeking(),
        audio_state: ctrl.audio_state(),
        volumes: [
            ctrl.volume(Track::News),
            ctrl.volume(Track::Video),
            ctrl.volume(Track::Master),
        ],
        playlist,
        debug: ui.show_debug.then(|| ctrl.stats()),
    }
}

/// Route one gesture into the engine.
pub fn apply(
    ctrl: &mut TimelineController,
    ui: &mut UiState,
    gesture: Gesture,
    now: Instant,
) -> GestureOutcome {
    debug!("gesture: {:?}", gesture);
    match gesture {
        Gesture::Play => ctrl.play(now),
        Gesture::Pause => ctrl.pause(now),
        Gesture::Stop => ctrl.stop(now),
        Gesture::TimelineClick { fraction } => {
            let t = fraction.clamp(0.0, 1.0) * ctrl.total_duration();
            ctrl.seek(t, now);
        }
        Gesture::PlaylistClick { index } => {
            if let Some(seg) = ctrl.manifest().segments.get(index) {
                let start = seg.start_time;
                ctrl.seek(start, now);
            }
        }
        Gesture::SetVolume { track, percent } => {
            ctrl.mixer.set_gain(track, f32::from(percent.min(100)) / 100.0);
        }
        Gesture::ToggleDebug => ui.show_debug = !ui.show_debug,
        Gesture::Reload => return GestureOutcome::ReloadRequested,
    }
    GestureOutcome::Handled
}
