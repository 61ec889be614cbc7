//! Media resource pool: load orchestration and element ownership.
//!
//! The pool owns every element the broadcast can reference, keyed by source
//! path so a resource shared by several segments is fetched once. Loads run
//! on background threads and complete through the [`MediaEventQueue`]; the
//! pool mutates handles only when the controller drains that queue on a tick,
//! so playback state keeps a single writer.
//!
//! Activation is decoupled from loading: a segment transition *begins* an
//! activation, and each tick *polls* it until every resource is started,
//! failed, or timed out. While an activation waits, the previous segment's
//! visual stays on screen; after the load timeout the pool degrades to a
//! placeholder and the broadcast keeps moving.

use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use indexmap::IndexMap;
use log::{debug, trace, warn};
use thiserror::Error;

use crate::core::events::MediaEvent;
use crate::core::loader::MediaLoader;
use crate::core::manifest::{Manifest, MediaKind, MediaRef, MediaRole};
use crate::core::media::{ClockElement, LoadState, MediaElement};
use crate::core::mixer::{Track, VolumeMixer};

/// Non-fatal load problem. The broadcast continues; the affected resource is
/// replaced by a placeholder.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MediaLoadError {
    #[error("load failed for {id}: {reason}")]
    Failed { id: String, reason: String },
    #[error("load timed out for {id} after {timeout_secs:.1}s")]
    Timeout { id: String, timeout_secs: f64 },
}

/// What the display should show for the active segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveVisual {
    Video(String),
    Image(String),
    /// No visual available (audio-only segment, or degraded load).
    Placeholder,
}

/// One pooled resource and its element.
struct ResourceHandle {
    media: MediaRef,
    state: LoadState,
    requested_at: Option<Instant>,
    /// Token of the outstanding (or last) load request.
    token: u64,
    /// Failure reason, kept for one-shot reporting.
    error: Option<String>,
    element: Option<Box<dyn MediaElement>>,
}

impl ResourceHandle {
    fn new(media: MediaRef) -> Self {
        Self {
            media,
            state: LoadState::Unloaded,
            requested_at: None,
            token: 0,
            error: None,
            element: None,
        }
    }
}

/// In-flight activation of one segment's resources.
struct Activation {
    segment: usize,
    since: Instant,
    /// Resource ids whose elements have been seeked + started.
    started: Vec<String>,
    /// Failures already surfaced to the controller.
    reported: Vec<String>,
}

/// Per-tick activation outcome.
#[derive(Debug, Default)]
pub struct ActivationReport {
    /// Resources started this tick.
    pub started: Vec<String>,
    /// New failures (load errors and timeouts), reported once each.
    pub failed: Vec<MediaLoadError>,
    /// Resources still loading within the timeout window.
    pub waiting: usize,
}

pub struct MediaResourcePool {
    resources: IndexMap<String, ResourceHandle>,
    /// Resource ids per segment index, in manifest order.
    segment_media: Vec<Vec<String>>,
    /// Id of the combined voice track.
    audio_id: String,
    current: Option<Activation>,
    /// Last successfully shown background visual; held on screen across a
    /// transition until the incoming segment is ready.
    held_visual: Option<(String, MediaKind)>,
    loader: Box<dyn MediaLoader>,
    tx: Sender<MediaEvent>,
    next_token: u64,
    /// Completions tagged with an older token are stale and dropped.
    min_valid_token: u64,
    load_timeout: Duration,
}

impl MediaResourcePool {
    pub fn new(
        manifest: &Manifest,
        loader: Box<dyn MediaLoader>,
        tx: Sender<MediaEvent>,
        load_timeout: Duration,
    ) -> Self {
        let mut resources: IndexMap<String, ResourceHandle> = IndexMap::new();

        let audio_id = manifest.combined.path.clone();
        resources.insert(
            audio_id.clone(),
            ResourceHandle::new(MediaRef {
                kind: MediaKind::AudioTrack,
                source_path: audio_id.clone(),
                role: MediaRole::Background,
            }),
        );

        let segment_media = manifest
            .segments
            .iter()
            .map(|seg| {
                seg.media
                    .iter()
                    .map(|m| {
                        let id = m.source_path.clone();
                        resources
                            .entry(id.clone())
                            .or_insert_with(|| ResourceHandle::new(m.clone()));
                        id
                    })
                    .collect()
            })
            .collect();

        Self {
            resources,
            segment_media,
            audio_id,
            current: None,
            held_visual: None,
            loader,
            tx,
            next_token: 1,
            min_valid_token: 0,
            load_timeout,
        }
    }

    // ========== Loading ==========

    /// Start a load for `id` unless one is already underway or done.
    fn request_load(&mut self, id: &str, now: Instant) {
        let (media, token) = {
            let handle = match self.resources.get_mut(id) {
                Some(h) => h,
                None => return,
            };
            if handle.state != LoadState::Unloaded {
                return;
            }
            let token = self.next_token;
            self.next_token += 1;
            handle.state = LoadState::Loading;
            handle.requested_at = Some(now);
            handle.token = token;
            handle.error = None;
            (handle.media.clone(), token)
        };
        trace!("load #{} {}", token, id);
        self.loader.request(id, &media, token, self.tx.clone());
    }

    /// Kick off loads for the resources of segment index `idx`. Idempotent.
    pub fn prepare_index(&mut self, idx: usize, now: Instant) {
        for id in self.segment_media.get(idx).cloned().unwrap_or_default() {
            self.request_load(&id, now);
        }
    }

    /// Start loading the combined voice track. Idempotent.
    pub fn prepare_audio(&mut self, now: Instant) {
        let id = self.audio_id.clone();
        self.request_load(&id, now);
    }

    /// Apply one drained load completion. Stale or mismatched tokens are
    /// discarded; valid completions only flip the handle state.
    pub fn apply_event(&mut self, event: MediaEvent) {
        match event {
            MediaEvent::Loaded { id, token } => {
                if token < self.min_valid_token {
                    debug!("discarding stale completion #{} for {}", token, id);
                    return;
                }
                if let Some(h) = self.resources.get_mut(&id) {
                    if h.state == LoadState::Loading && h.token == token {
                        h.state = LoadState::Ready;
                        h.element = Some(Box::new(ClockElement::new(h.media.kind)));
                        debug!("ready: {}", id);
                    }
                }
            }
            MediaEvent::Failed { id, token, reason } => {
                if token < self.min_valid_token {
                    debug!("discarding stale failure #{} for {}", token, id);
                    return;
                }
                if let Some(h) = self.resources.get_mut(&id) {
                    if h.state == LoadState::Loading && h.token == token {
                        warn!("load failed: {}: {}", id, reason);
                        h.state = LoadState::Failed;
                        h.error = Some(reason);
                    }
                }
            }
        }
    }

    // ========== Activation ==========

    /// Record a pending activation for segment index `idx` and start any
    /// loads it still needs. Elements start on later [`poll_activation`]
    /// calls as their resources come ready.
    pub fn begin_activation(&mut self, idx: usize, now: Instant) {
        self.prepare_index(idx, now);
        self.current = Some(Activation {
            segment: idx,
            since: now,
            started: Vec::new(),
            reported: Vec::new(),
        });
    }

    /// Advance the pending activation: start elements that came ready (seek
    /// to `position`, play if `playing`), time out ones that took too long,
    /// and surface new failures exactly once.
    pub fn poll_activation(
        &mut self,
        position: f64,
        playing: bool,
        now: Instant,
    ) -> ActivationReport {
        let mut report = ActivationReport::default();
        let mut act = match self.current.take() {
            Some(a) => a,
            None => return report,
        };

        let ids = self
            .segment_media
            .get(act.segment)
            .cloned()
            .unwrap_or_default();
        for id in ids {
            if act.started.contains(&id) {
                continue;
            }
            let handle = match self.resources.get_mut(&id) {
                Some(h) => h,
                None => continue,
            };
            match handle.state {
                LoadState::Ready => {
                    if let Some(el) = handle.element.as_mut() {
                        el.seek(position, now);
                        if playing {
                            el.play(now);
                        }
                    }
                    act.started.push(id.clone());
                    report.started.push(id);
                }
                LoadState::Loading => {
                    let waited = handle
                        .requested_at
                        .map(|t| now.duration_since(t))
                        .unwrap_or_default();
                    if waited >= self.load_timeout {
                        let timeout_secs = self.load_timeout.as_secs_f64();
                        warn!("load timed out: {} ({:.1}s)", id, timeout_secs);
                        handle.state = LoadState::Failed;
                        handle.error = Some("timed out".to_string());
                        act.reported.push(id.clone());
                        report.failed.push(MediaLoadError::Timeout { id, timeout_secs });
                    } else {
                        report.waiting += 1;
                    }
                }
                LoadState::Failed => {
                    if !act.reported.contains(&id) {
                        let reason = handle
                            .error
                            .clone()
                            .unwrap_or_else(|| "unknown".to_string());
                        act.reported.push(id.clone());
                        report.failed.push(MediaLoadError::Failed { id, reason });
                    }
                }
                LoadState::Unloaded => {
                    // Can happen right after a stop raised the token floor.
                    report.waiting += 1;
                }
            }
        }

        // The newest started background visual becomes the held one, so the
        // next transition keeps it on screen while its successor loads.
        if let Some(sel) = self.select_visual(&act.started) {
            self.held_visual = Some(sel);
        }

        self.current = Some(act);
        report
    }

    /// True once the pending activation has nothing left to wait for.
    pub fn activation_settled(&self, now: Instant) -> bool {
        let act = match &self.current {
            Some(a) => a,
            None => return true,
        };
        let ids = match self.segment_media.get(act.segment) {
            Some(ids) => ids,
            None => return true,
        };
        ids.iter().all(|id| {
            if act.started.contains(id) {
                return true;
            }
            match self.resources.get(id) {
                Some(h) => match h.state {
                    LoadState::Failed => true,
                    LoadState::Ready => false,
                    LoadState::Loading | LoadState::Unloaded => h
                        .requested_at
                        .map(|t| now.duration_since(t) >= self.load_timeout)
                        .unwrap_or(false),
                },
                None => true,
            }
        })
    }

    /// Pause the elements of segment index `idx` and drop its activation.
    /// The held visual survives so it stays on screen through the handover.
    pub fn deactivate(&mut self, idx: usize, now: Instant) {
        if self.current.as_ref().map(|a| a.segment) == Some(idx) {
            self.current = None;
        }
        for id in self.segment_media.get(idx).cloned().unwrap_or_default() {
            if let Some(el) = self
                .resources
                .get_mut(&id)
                .and_then(|h| h.element.as_mut())
            {
                el.pause(now);
            }
        }
    }

    // ========== Playback plumbing ==========

    /// Keep the combined voice track's transport in step with the engine.
    /// When it starts it is seeked to `t` first, so resume lands exactly
    /// where the clock is.
    pub fn ensure_audio(&mut self, t: f64, playing: bool, now: Instant) {
        let id = self.audio_id.clone();
        if let Some(el) = self.resources.get_mut(&id).and_then(|h| h.element.as_mut()) {
            if playing && !el.is_playing() {
                el.seek(t, now);
                el.play(now);
            } else if !playing && el.is_playing() {
                el.pause(now);
            }
        }
    }

    /// Seek the combined voice track without touching its transport.
    pub fn seek_audio(&mut self, t: f64, now: Instant) {
        let id = self.audio_id.clone();
        if let Some(el) = self.resources.get_mut(&id).and_then(|h| h.element.as_mut()) {
            el.seek(t, now);
        }
    }

    /// Playback position of the combined voice track, if it is ready.
    pub fn audio_position(&self, now: Instant) -> Option<f64> {
        self.resources
            .get(&self.audio_id)
            .and_then(|h| h.element.as_ref())
            .map(|el| el.position(now))
    }

    pub fn audio_state(&self) -> LoadState {
        self.resources
            .get(&self.audio_id)
            .map(|h| h.state)
            .unwrap_or(LoadState::Unloaded)
    }

    /// Snap every started video of the active segment to `t` (drift
    /// correction). The voice track is the reference and is left alone.
    pub fn reseek_videos(&mut self, t: f64, now: Instant) {
        let ids = match &self.current {
            Some(act) => act.started.clone(),
            None => return,
        };
        for id in ids {
            if let Some(h) = self.resources.get_mut(&id) {
                if h.media.kind == MediaKind::Video {
                    if let Some(el) = h.element.as_mut() {
                        el.seek(t, now);
                    }
                }
            }
        }
    }

    /// Pause every started element of the active segment.
    pub fn pause_active(&mut self, now: Instant) {
        let ids = match &self.current {
            Some(act) => act.started.clone(),
            None => Vec::new(),
        };
        for id in ids {
            if let Some(el) = self.resources.get_mut(&id).and_then(|h| h.element.as_mut()) {
                el.pause(now);
            }
        }
    }

    /// Resume every started element of the active segment at `t`.
    pub fn resume_active(&mut self, t: f64, now: Instant) {
        let ids = match &self.current {
            Some(act) => act.started.clone(),
            None => Vec::new(),
        };
        for id in ids {
            if let Some(el) = self.resources.get_mut(&id).and_then(|h| h.element.as_mut()) {
                el.seek(t, now);
                el.play(now);
            }
        }
    }

    /// Full teardown: pause everything, drop activation state, invalidate
    /// in-flight loads and reset their handles so a replay re-requests them.
    pub fn stop_all(&mut self, now: Instant) {
        for (_, handle) in self.resources.iter_mut() {
            if let Some(el) = handle.element.as_mut() {
                el.pause(now);
            }
            if handle.state == LoadState::Loading {
                handle.state = LoadState::Unloaded;
                handle.requested_at = None;
            }
        }
        self.current = None;
        self.held_visual = None;
        self.min_valid_token = self.next_token;
    }

    /// Push mixer gains onto the audible elements: the voice track follows
    /// the news gain, video elements follow the video gain.
    pub fn apply_gains(&mut self, mixer: &VolumeMixer) {
        let news = mixer.effective(Track::News);
        let video = mixer.effective(Track::Video);
        for (_, handle) in self.resources.iter_mut() {
            if let Some(el) = handle.element.as_mut() {
                match handle.media.kind {
                    MediaKind::AudioTrack => el.set_gain(news),
                    MediaKind::Video => el.set_gain(video),
                    MediaKind::Image => {}
                }
            }
        }
    }

    // ========== Introspection ==========

    /// Ids of elements currently playing (for the debug overlay).
    pub fn active_ids(&self) -> Vec<String> {
        self.resources
            .iter()
            .filter(|(_, h)| h.element.as_ref().map(|el| el.is_playing()).unwrap_or(false))
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn load_state(&self, id: &str) -> Option<LoadState> {
        self.resources.get(id).map(|h| h.state)
    }

    /// Pick the background visual among `ids`: video beats image, overlays
    /// never count.
    fn select_visual(&self, ids: &[String]) -> Option<(String, MediaKind)> {
        let pick = |kind: MediaKind| {
            ids.iter().find(|id| {
                self.resources
                    .get(*id)
                    .map(|h| h.media.kind == kind && h.media.role != MediaRole::Overlay)
                    .unwrap_or(false)
            })
        };
        pick(MediaKind::Video)
            .or_else(|| pick(MediaKind::Image))
            .map(|id| (id.clone(), self.resources[id].media.kind))
    }

    /// What to show right now. While an activation still waits on loads the
    /// previous visual is held on screen; once it settles without a visual
    /// (audio-only segment, or every load degraded) the placeholder shows.
    pub fn visual(&self, now: Instant) -> ActiveVisual {
        let act = match &self.current {
            Some(a) => a,
            None => return ActiveVisual::Placeholder,
        };
        if let Some((id, kind)) = self.select_visual(&act.started) {
            return match kind {
                MediaKind::Video => ActiveVisual::Video(id),
                _ => ActiveVisual::Image(id),
            };
        }
        if !self.activation_settled(now) {
            if let Some((id, kind)) = &self.held_visual {
                return match kind {
                    MediaKind::Video => ActiveVisual::Video(id.clone()),
                    _ => ActiveVisual::Image(id.clone()),
                };
            }
        }
        ActiveVisual::Placeholder
    }

    /// Started overlay (anchor video) of the active segment, if any.
    pub fn overlay(&self) -> Option<String> {
        let act = self.current.as_ref()?;
        act.started
            .iter()
            .find(|id| {
                self.resources
                    .get(*id)
                    .map(|h| h.media.role == MediaRole::Overlay)
                    .unwrap_or(false)
            })
            .cloned()
    }
}
