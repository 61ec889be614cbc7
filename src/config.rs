//! Engine tuning knobs.
//!
//! Defaults are the production values; a JSON config file can override any
//! subset of them. Timing values are plain numbers so the file stays
//! hand-editable.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Audio/clock divergence that triggers a snap, in seconds.
    pub drift_threshold_secs: f64,
    /// Spacing between drift checks, in milliseconds.
    pub drift_interval_ms: u64,
    /// How long a resource may load before the segment degrades.
    pub load_timeout_secs: f64,
    /// How many upcoming segments to preload past the active one.
    pub lookahead_segments: usize,
    /// Allowed mismatch between declared and computed programme duration.
    pub duration_tolerance_secs: f64,
    /// Tick rate while playing.
    pub playing_tick_hz: u32,
    /// Tick rate while paused or stopped (UI stays responsive).
    pub idle_tick_hz: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            drift_threshold_secs: 0.150,
            drift_interval_ms: 500,
            load_timeout_secs: 5.0,
            lookahead_segments: 1,
            duration_tolerance_secs: 0.5,
            playing_tick_hz: 60,
            idle_tick_hz: 10,
        }
    }
}

impl EngineConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn drift_interval(&self) -> Duration {
        Duration::from_millis(self.drift_interval_ms)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.load_timeout_secs)
    }

    pub fn playing_tick(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.playing_tick_hz.max(1) as f64)
    }

    pub fn idle_tick(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.idle_tick_hz.max(1) as f64)
    }
}
