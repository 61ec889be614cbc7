//! Manifest model: parses the pipeline-produced JSON into a validated timeline.
//!
//! The manifest is produced by an external generation pipeline and served at
//! `/api/news/manifest`. This module owns the wire schema, validation, and the
//! one-time derivation of per-segment time ranges. Segments are immutable once
//! loaded; nothing downstream ever re-sorts or mutates them.
//!
//! Scheduling ground truth is the *sum of segment durations*, not the declared
//! combined-audio duration: the sum is what drives per-segment transitions. A
//! divergence beyond tolerance is logged as a non-fatal warning.

use log::warn;
use serde::Deserialize;
use thiserror::Error;

// ========== Wire schema (field names fixed by the external pipeline) ==========

/// Top-level manifest JSON as served by the broadcast server.
#[derive(Debug, Clone, Deserialize)]
pub struct RawManifest {
    pub individual_segments: Vec<RawSegment>,
    pub combined_audio: RawCombinedAudio,
}

/// One timed broadcast unit as written by the TTS/media pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSegment {
    pub segment_type: String,
    pub display_name: String,
    #[serde(default)]
    pub audio_file: String,
    #[serde(default)]
    pub audio_path: String,
    #[serde(default)]
    pub script: String,
    pub duration: f64,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub media: Vec<RawMedia>,
}

/// Media attachment entry. Exactly one of `video`/`image` is set.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMedia {
    #[serde(default)]
    pub video: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    pub path: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

/// Combined (already mixed) voice track covering the whole broadcast.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCombinedAudio {
    pub combined_file: String,
    pub combined_path: String,
    pub total_duration: f64,
}

// ========== Errors & warnings ==========

/// Fatal manifest problems. Any of these aborts session start; a broken
/// manifest never produces partial playback.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("manifest contains no segments")]
    Empty,

    #[error("segment {index} ({name}) has invalid duration {duration}")]
    InvalidDuration {
        index: usize,
        name: String,
        duration: f64,
    },

    #[error("combined audio declares invalid total duration {0}")]
    InvalidTotalDuration(f64),

    #[error("malformed manifest: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("manifest fetch failed with HTTP status {0}")]
    Http(u16),

    #[error("manifest I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Non-fatal observations recorded during load (also logged).
#[derive(Debug, Clone, PartialEq)]
pub enum ManifestWarning {
    /// Declared combined-audio duration diverges from the segment sum beyond
    /// tolerance. Scheduling proceeds on the segment sum.
    DurationMismatch { declared: f64, computed: f64 },
    /// Unrecognized `segment_type` string; the segment was kept as a story.
    UnknownSegmentType { segment: String, raw: String },
}

// ========== Domain model ==========

/// Broadcast segment category. Drives visual treatment via the capability
/// table in [`SegmentKind::visual_caps`] instead of branching in render code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Opening,
    Summary,
    Story,
    Closing,
}

/// Ken-Burns-style motion applied to still visuals of a segment kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionVariant {
    Static,
    SlowZoom,
    PanScan,
}

/// Which visual slots a segment kind may fill, and how stills move.
#[derive(Debug, Clone, Copy)]
pub struct VisualCaps {
    pub background: bool,
    pub overlay: bool,
    pub motion: MotionVariant,
}

impl SegmentKind {
    /// Map the pipeline's `segment_type` strings onto engine kinds.
    /// Unknown strings fall back to `Story` (the server forwards whatever
    /// the pipeline wrote, so this must not be fatal).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "opening_greeting" => Some(Self::Opening),
            "headline_opening" | "headline" => Some(Self::Summary),
            "news" => Some(Self::Story),
            "closing_remarks" => Some(Self::Closing),
            _ => None,
        }
    }

    /// Capability table: visual slots + motion variant per kind.
    pub fn visual_caps(self) -> VisualCaps {
        match self {
            Self::Opening | Self::Closing => VisualCaps {
                background: true,
                overlay: false,
                motion: MotionVariant::Static,
            },
            Self::Summary => VisualCaps {
                background: true,
                overlay: true,
                motion: MotionVariant::SlowZoom,
            },
            Self::Story => VisualCaps {
                background: true,
                overlay: true,
                motion: MotionVariant::PanScan,
            },
        }
    }

    /// Short identifier used in segment ids and transport output.
    pub fn slug(self) -> &'static str {
        match self {
            Self::Opening => "opening",
            Self::Summary => "summary",
            Self::Story => "story",
            Self::Closing => "closing",
        }
    }
}

/// Media attachment category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Image,
    AudioTrack,
}

/// Where a media attachment is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaRole {
    Background,
    Overlay,
    Intro,
    Outro,
}

/// Reference to one media resource of a segment.
#[derive(Debug, Clone)]
pub struct MediaRef {
    pub kind: MediaKind,
    pub source_path: String,
    pub role: MediaRole,
}

impl MediaRef {
    fn from_raw(raw: &RawMedia, segment_kind: SegmentKind) -> Option<Self> {
        let kind = if raw.video.is_some() {
            MediaKind::Video
        } else if raw.image.is_some() {
            MediaKind::Image
        } else {
            return None;
        };

        let role = match raw.kind.as_deref() {
            Some("anchor_video") => MediaRole::Overlay,
            _ => match segment_kind {
                SegmentKind::Opening => MediaRole::Intro,
                SegmentKind::Closing => MediaRole::Outro,
                _ => MediaRole::Background,
            },
        };

        Some(Self {
            kind,
            source_path: raw.path.clone(),
            role,
        })
    }
}

/// One validated, time-positioned segment. Immutable after load.
#[derive(Debug, Clone)]
pub struct Segment {
    pub id: String,
    pub display_name: String,
    pub kind: SegmentKind,
    pub script: String,
    pub duration: f64,
    /// Derived: sum of all prior segment durations.
    pub start_time: f64,
    /// Derived: `start_time + duration`.
    pub end_time: f64,
    pub media: Vec<MediaRef>,
    pub language: Option<String>,
}

impl Segment {
    /// Dominant visual for the segment: video > image > none (audio-only).
    /// Overlays never dominate; they are drawn atop the background visual.
    pub fn dominant_visual(&self) -> Option<&MediaRef> {
        let non_overlay = || self.media.iter().filter(|m| m.role != MediaRole::Overlay);
        non_overlay()
            .find(|m| m.kind == MediaKind::Video)
            .or_else(|| non_overlay().find(|m| m.kind == MediaKind::Image))
    }

    /// First overlay attachment (anchor video), if any.
    pub fn overlay(&self) -> Option<&MediaRef> {
        self.media.iter().find(|m| m.role == MediaRole::Overlay)
    }
}

/// Authoritative combined voice track descriptor.
#[derive(Debug, Clone)]
pub struct CombinedAudio {
    pub file: String,
    pub path: String,
    pub total_duration: f64,
}

/// Validated timeline: ordered segments with contiguous, non-overlapping
/// ranges covering `[0, total_duration]`.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub segments: Vec<Segment>,
    pub combined: CombinedAudio,
    /// Segment-sum duration: the scheduling ground truth.
    pub total_duration: f64,
    pub warnings: Vec<ManifestWarning>,
}

impl Manifest {
    /// Validate a raw manifest and derive the timeline.
    ///
    /// `duration_tolerance_secs` bounds how far the declared combined-audio
    /// duration may diverge from the segment sum before a
    /// [`ManifestWarning::DurationMismatch`] is recorded (non-fatal).
    pub fn load(raw: RawManifest, duration_tolerance_secs: f64) -> Result<Self, ManifestError> {
        if raw.individual_segments.is_empty() {
            return Err(ManifestError::Empty);
        }
        if !raw.combined_audio.total_duration.is_finite()
            || raw.combined_audio.total_duration <= 0.0
        {
            return Err(ManifestError::InvalidTotalDuration(
                raw.combined_audio.total_duration,
            ));
        }

        let mut warnings = Vec::new();
        let mut segments = Vec::with_capacity(raw.individual_segments.len());
        let mut cursor = 0.0_f64;

        // Source order is the timeline order; never re-sort.
        for (index, seg) in raw.individual_segments.iter().enumerate() {
            if !seg.duration.is_finite() || seg.duration <= 0.0 {
                return Err(ManifestError::InvalidDuration {
                    index,
                    name: seg.display_name.clone(),
                    duration: seg.duration,
                });
            }

            let kind = SegmentKind::parse(&seg.segment_type).unwrap_or_else(|| {
                warn!(
                    "segment {} has unknown type {:?}, treating as story",
                    index, seg.segment_type
                );
                warnings.push(ManifestWarning::UnknownSegmentType {
                    segment: seg.display_name.clone(),
                    raw: seg.segment_type.clone(),
                });
                SegmentKind::Story
            });

            let media = seg
                .media
                .iter()
                .filter_map(|m| MediaRef::from_raw(m, kind))
                .collect();

            segments.push(Segment {
                id: format!("{:02}-{}", index, kind.slug()),
                display_name: seg.display_name.clone(),
                kind,
                script: seg.script.clone(),
                duration: seg.duration,
                start_time: cursor,
                end_time: cursor + seg.duration,
                media,
                language: seg.language.clone(),
            });
            cursor += seg.duration;
        }

        let computed = cursor;
        let declared = raw.combined_audio.total_duration;
        if (declared - computed).abs() > duration_tolerance_secs {
            warn!(
                "combined audio duration {:.3}s diverges from segment sum {:.3}s \
                 (tolerance {:.1}s); scheduling on segment sum",
                declared, computed, duration_tolerance_secs
            );
            warnings.push(ManifestWarning::DurationMismatch { declared, computed });
        }

        Ok(Self {
            segments,
            combined: CombinedAudio {
                file: raw.combined_audio.combined_file,
                path: raw.combined_audio.combined_path,
                total_duration: declared,
            },
            total_duration: computed,
            warnings,
        })
    }

    /// Parse and validate in one step.
    pub fn from_json_str(json: &str, duration_tolerance_secs: f64) -> Result<Self, ManifestError> {
        let raw: RawManifest = serde_json::from_str(json)?;
        Self::load(raw, duration_tolerance_secs)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> String {
        r#"{
            "individual_segments": [
                {
                    "segment_type": "opening_greeting",
                    "display_name": "Opening",
                    "audio_file": "opening.mp3",
                    "audio_path": "/generated/audio/opening.mp3",
                    "script": "Good evening.",
                    "duration": 15.456,
                    "language": "en",
                    "media": [
                        {"video": "intro.mp4", "path": "media/intro.mp4", "type": "video"}
                    ]
                },
                {
                    "segment_type": "headline",
                    "display_name": "Headlines",
                    "audio_file": "headlines.mp3",
                    "audio_path": "/generated/audio/headlines.mp3",
                    "script": "Tonight's top stories.",
                    "duration": 40.0,
                    "media": [
                        {"image": "story1.jpg", "path": "media/story1.jpg", "type": "image"},
                        {"video": "headlines.mp4", "path": "/generated/anchor/headlines.mp4", "type": "anchor_video"}
                    ]
                },
                {
                    "segment_type": "news",
                    "display_name": "Story One",
                    "audio_file": "story1.mp3",
                    "audio_path": "/generated/audio/story1.mp3",
                    "script": "In local news today...",
                    "duration": 139.864,
                    "media": [
                        {"image": "story1.jpg", "path": "media/story1.jpg", "type": "image"}
                    ]
                }
            ],
            "combined_audio": {
                "combined_file": "broadcast.mp3",
                "combined_path": "/generated/broadcast.mp3",
                "total_duration": 195.32
            }
        }"#
        .to_string()
    }

    #[test]
    fn test_load_derives_contiguous_ranges() {
        let m = Manifest::from_json_str(&sample_json(), 0.5).unwrap();
        assert_eq!(m.len(), 3);
        assert_eq!(m.segments[0].start_time, 0.0);
        assert!((m.segments[0].end_time - 15.456).abs() < 1e-9);
        assert!((m.segments[1].start_time - 15.456).abs() < 1e-9);
        assert!((m.segments[1].end_time - 55.456).abs() < 1e-9);
        assert!((m.segments[2].start_time - 55.456).abs() < 1e-9);
        assert!((m.total_duration - 195.32).abs() < 1e-9);
        // Declared 195.32 equals the sum exactly; no warning.
        assert!(m.warnings.is_empty());
    }

    #[test]
    fn test_segment_kind_mapping() {
        let m = Manifest::from_json_str(&sample_json(), 0.5).unwrap();
        assert_eq!(m.segments[0].kind, SegmentKind::Opening);
        assert_eq!(m.segments[1].kind, SegmentKind::Summary);
        assert_eq!(m.segments[2].kind, SegmentKind::Story);
        assert_eq!(m.segments[0].id, "00-opening");
    }

    #[test]
    fn test_media_roles() {
        let m = Manifest::from_json_str(&sample_json(), 0.5).unwrap();
        // Intro video on the opening segment.
        assert_eq!(m.segments[0].media[0].role, MediaRole::Intro);
        assert_eq!(m.segments[0].media[0].kind, MediaKind::Video);
        // Anchor video maps to overlay; the still stays background.
        assert_eq!(m.segments[1].media[0].role, MediaRole::Background);
        assert_eq!(m.segments[1].media[1].role, MediaRole::Overlay);
    }

    #[test]
    fn test_dominant_visual_precedence() {
        let m = Manifest::from_json_str(&sample_json(), 0.5).unwrap();
        // Opening: background video wins.
        assert_eq!(
            m.segments[0].dominant_visual().unwrap().kind,
            MediaKind::Video
        );
        // Headlines: overlay video must NOT dominate; background image wins.
        assert_eq!(
            m.segments[1].dominant_visual().unwrap().kind,
            MediaKind::Image
        );
        assert!(m.segments[1].overlay().is_some());
    }

    #[test]
    fn test_duration_mismatch_warning_is_nonfatal() {
        let json = sample_json().replace("195.32", "200.0");
        let m = Manifest::from_json_str(&json, 0.5).unwrap();
        assert!(m
            .warnings
            .iter()
            .any(|w| matches!(w, ManifestWarning::DurationMismatch { .. })));
        // Segment sum stays the scheduling ground truth.
        assert!((m.total_duration - 195.32).abs() < 1e-9);
        assert!((m.combined.total_duration - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_within_tolerance_no_warning() {
        let json = sample_json().replace("195.32", "195.6");
        let m = Manifest::from_json_str(&json, 0.5).unwrap();
        assert!(m.warnings.is_empty());
    }

    #[test]
    fn test_invalid_duration_rejected() {
        let json = sample_json().replace("\"duration\": 40.0", "\"duration\": -1.0");
        match Manifest::from_json_str(&json, 0.5) {
            Err(ManifestError::InvalidDuration { index, .. }) => assert_eq!(index, 1),
            other => panic!("expected InvalidDuration, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_empty_manifest_rejected() {
        let json = r#"{"individual_segments": [],
            "combined_audio": {"combined_file": "a", "combined_path": "a", "total_duration": 1.0}}"#;
        assert!(matches!(
            Manifest::from_json_str(json, 0.5),
            Err(ManifestError::Empty)
        ));
    }

    #[test]
    fn test_unknown_segment_type_falls_back_to_story() {
        let json = sample_json().replace("opening_greeting", "weather_flash");
        let m = Manifest::from_json_str(&json, 0.5).unwrap();
        assert_eq!(m.segments[0].kind, SegmentKind::Story);
        assert!(m
            .warnings
            .iter()
            .any(|w| matches!(w, ManifestWarning::UnknownSegmentType { .. })));
    }

    #[test]
    fn test_visual_caps_table() {
        assert_eq!(
            SegmentKind::Story.visual_caps().motion,
            MotionVariant::PanScan
        );
        assert!(!SegmentKind::Opening.visual_caps().overlay);
        assert!(SegmentKind::Summary.visual_caps().overlay);
    }
}
