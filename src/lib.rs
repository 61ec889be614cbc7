//! NEXCAST - Broadcast timeline synchronization engine
//!
//! Re-exports all modules for use by binary targets.

// Core engine (manifest, scheduler, media pool, controller)
pub mod core;

// App modules
pub mod cli;
pub mod config;
pub mod ui;

// Re-export commonly used types from core
pub use crate::core::controller::{DebugStats, PlaybackState, TimelineController};
pub use crate::core::manifest::{Manifest, ManifestError, Segment, SegmentKind};
pub use crate::core::mixer::{Track, VolumeMixer};
pub use crate::core::pool::{ActiveVisual, MediaLoadError};
pub use crate::core::scheduler::SegmentScheduler;

// Re-export the engine configuration
pub use config::EngineConfig;
