//! Player configuration.
//!
//! Settings are read from an optional JSON file. Every field has a default,
//! so a config file only needs the values it changes:
//!
//! ```json
//! { "skip_seconds": 10, "sync_policy": "absolute" }
//! ```

use crate::sync::SyncPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default skip distance for the skip forward/backward controls.
pub const SKIP_TIME_SECONDS: f64 = 30.0;

/// Look of a single waveform lane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WaveformOptions {
    pub wave_color: String,
    pub progress_color: String,
    pub cursor_color: String,
    pub bar_width: u16,
    pub bar_radius: u16,
    pub cursor_width: u16,
    pub height: u16,
}

impl Default for WaveformOptions {
    fn default() -> Self {
        Self {
            wave_color: "#4F46E5".to_string(),
            progress_color: "#7C3AED".to_string(),
            cursor_color: "#7C3AED".to_string(),
            bar_width: 2,
            bar_radius: 3,
            cursor_width: 1,
            height: 100,
        }
    }
}

/// Look of the shared multi-lane view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MultitrackOptions {
    pub cursor_width: u16,
    pub cursor_color: String,
    pub track_background: String,
    pub track_border_color: String,
    pub drag_bounds: bool,
}

impl Default for MultitrackOptions {
    fn default() -> Self {
        Self {
            cursor_width: 2,
            cursor_color: "#D72F21".to_string(),
            track_background: "transparent".to_string(),
            track_border_color: "#7C7C7C".to_string(),
            drag_bounds: false,
        }
    }
}

/// Zoom slider settings, in pixels per second.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomConfig {
    pub initial: f64,
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            initial: 5.0,
            min: 1.0,
            max: 100.0,
            step: 5.0,
        }
    }
}

impl ZoomConfig {
    /// Clamps a zoom value into the configured range.
    pub fn clamp(&self, zoom: f64) -> f64 {
        zoom.clamp(self.min, self.max)
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Seconds moved by skip forward/backward.
    pub skip_seconds: f64,
    /// Master volume for a fresh session.
    pub initial_volume: f64,
    /// Volume change per key press.
    pub volume_step: f64,
    pub zoom: ZoomConfig,
    /// How a waveform interaction on one lane moves the others.
    pub sync_policy: SyncPolicy,
    pub waveform: WaveformOptions,
    pub multitrack: MultitrackOptions,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            skip_seconds: SKIP_TIME_SECONDS,
            initial_volume: 1.0,
            volume_step: 0.05,
            zoom: ZoomConfig::default(),
            sync_policy: SyncPolicy::default(),
            waveform: WaveformOptions::default(),
            multitrack: MultitrackOptions::default(),
        }
    }
}

impl PlayerConfig {
    /// Parses a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("Invalid player config")?;
        config.validated()
    }

    /// Loads a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("Failed to load config: {}", path.display()))
    }

    /// Serializes the configuration as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize player config")
    }

    /// Rejects values the transport cannot work with.
    fn validated(mut self) -> Result<Self> {
        let zoom = &self.zoom;
        if !(zoom.min > 0.0 && zoom.min <= zoom.max) {
            anyhow::bail!("zoom range must satisfy 0 < min <= max");
        }
        if !(zoom.initial.is_finite() && zoom.initial > 0.0) {
            anyhow::bail!("zoom.initial must be positive");
        }
        self.zoom.initial = self.zoom.clamp(self.zoom.initial);
        if !(self.skip_seconds.is_finite() && self.skip_seconds > 0.0) {
            anyhow::bail!("skip_seconds must be positive");
        }
        self.initial_volume = self.initial_volume.clamp(0.0, 1.0);
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PlayerConfig::default();
        assert_eq!(config.skip_seconds, 30.0);
        assert_eq!(config.initial_volume, 1.0);
        assert_eq!(config.zoom.initial, 5.0);
        assert_eq!(config.sync_policy, SyncPolicy::Proportional);
        assert_eq!(config.waveform.wave_color, "#4F46E5");
        assert_eq!(config.multitrack.cursor_color, "#D72F21");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config =
            PlayerConfig::from_json(r#"{ "skip_seconds": 10, "sync_policy": "absolute" }"#)
                .unwrap();
        assert_eq!(config.skip_seconds, 10.0);
        assert_eq!(config.sync_policy, SyncPolicy::Absolute);
        assert_eq!(config.volume_step, 0.05);
        assert_eq!(config.zoom, ZoomConfig::default());
    }

    #[test]
    fn test_camel_case_options() {
        let config =
            PlayerConfig::from_json(r##"{ "waveform": { "waveColor": "#000000" } }"##).unwrap();
        assert_eq!(config.waveform.wave_color, "#000000");
        assert_eq!(config.waveform.height, 100);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(PlayerConfig::from_json(r#"{ "zoom": { "min": 0 } }"#).is_err());
        assert!(PlayerConfig::from_json(r#"{ "zoom": { "initial": -5 } }"#).is_err());
        assert!(PlayerConfig::from_json(r#"{ "zoom": { "initial": 0 } }"#).is_err());
        assert!(PlayerConfig::from_json(r#"{ "skip_seconds": -1 }"#).is_err());
        assert!(PlayerConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_initial_zoom_clamped_into_range() {
        let config = PlayerConfig::from_json(r#"{ "zoom": { "initial": 500 } }"#).unwrap();
        assert_eq!(config.zoom.initial, 100.0);
        let config =
            PlayerConfig::from_json(r#"{ "zoom": { "initial": 2, "min": 10 } }"#).unwrap();
        assert_eq!(config.zoom.initial, 10.0);
    }

    #[test]
    fn test_default_zoom_within_range() {
        let zoom = ZoomConfig::default();
        assert_eq!((zoom.min, zoom.max), (1.0, 100.0));
        assert_eq!(zoom.clamp(zoom.initial), zoom.initial);
    }

    #[test]
    fn test_volume_clamped() {
        let config = PlayerConfig::from_json(r#"{ "initial_volume": 3.0 }"#).unwrap();
        assert_eq!(config.initial_volume, 1.0);
    }

    #[test]
    fn test_round_trip() {
        let config = PlayerConfig::default();
        let json = config.to_json().unwrap();
        assert_eq!(PlayerConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_zoom_clamp() {
        let zoom = ZoomConfig::default();
        assert_eq!(zoom.clamp(0.0), 1.0);
        assert_eq!(zoom.clamp(500.0), 100.0);
        assert_eq!(zoom.clamp(42.0), 42.0);
    }
}
