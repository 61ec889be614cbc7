//! Core engine modules - manifest, scheduling, media pool, playback
//!
//! These modules form the playback engine, independent of UI.

pub mod controller;
pub mod drift;
pub mod events;
pub mod loader;
pub mod manifest;
pub mod media;
pub mod mixer;
pub mod pool;
pub mod scheduler;

// Re-exports for convenience
pub use controller::{DebugStats, PlaybackState, TimelineController};
pub use drift::DriftCorrector;
pub use events::{MediaEvent, MediaEventQueue};
pub use loader::{FsLoader, HttpLoader, MediaLoader};
pub use manifest::{Manifest, ManifestError, Segment, SegmentKind};
pub use media::{LoadState, MediaElement};
pub use mixer::{Track, VolumeMixer};
pub use pool::{ActiveVisual, MediaLoadError, MediaResourcePool};
pub use scheduler::SegmentScheduler;
