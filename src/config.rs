//! JSON configuration for capture sessions and the encoder.

use crate::encode::pipe::EncoderConfig;
use crate::encode::preset::Preset;
use crate::foundation::core::Resolution;
use crate::foundation::error::{CaptureError, CaptureResult};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Shortest accepted record window.
pub const MIN_RECORD_LENGTH_SECS: f64 = 0.01;

/// Optional `[start, start + length)` gate on elapsed session time.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RecordWindow {
    /// Elapsed seconds at which recording starts.
    pub start_secs: f64,
    /// Seconds recorded once the window opens.
    pub length_secs: f64,
}

impl RecordWindow {
    /// Return `true` when `elapsed` falls inside the window.
    pub fn contains(&self, elapsed: Duration) -> bool {
        let t = elapsed.as_secs_f64();
        self.start_secs <= t && t < self.start_secs + self.length_secs
    }
}

/// Per-session capture settings.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Render into a dedicated target of `width` x `height` instead of scaling the screen.
    pub set_resolution: bool,
    /// Requested output width, normalized before use.
    pub width: u32,
    /// Requested output height, normalized before use.
    pub height: u32,
    /// Encoded frames per second.
    pub frame_rate: u32,
    /// Prefer frame-accurate output over real-time playback (fixed logical time step).
    pub allow_slow_down: bool,
    /// Encoder preset.
    pub preset: Preset,
    /// Only frames inside this window are written.
    pub record_window: Option<RecordWindow>,
    /// Request capture as soon as the session is set up.
    pub capturing: bool,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            set_resolution: true,
            width: 1280,
            height: 720,
            frame_rate: 30,
            allow_slow_down: true,
            preset: Preset::default(),
            record_window: None,
            capturing: false,
        }
    }
}

impl CaptureSettings {
    /// Reject zero sizes or frame rates and out-of-range record windows.
    pub fn validate(&self) -> CaptureResult<()> {
        if self.frame_rate == 0 {
            return Err(CaptureError::validation("frame_rate must be non-zero"));
        }
        Resolution::new(self.width, self.height)?;
        if let Some(w) = self.record_window {
            if !w.start_secs.is_finite() || w.start_secs < 0.0 {
                return Err(CaptureError::validation(
                    "record_window.start_secs must be >= 0",
                ));
            }
            if !w.length_secs.is_finite() || w.length_secs < MIN_RECORD_LENGTH_SECS {
                return Err(CaptureError::validation(format!(
                    "record_window.length_secs must be >= {MIN_RECORD_LENGTH_SECS}"
                )));
            }
        }
        Ok(())
    }

    /// The configured size, before normalization.
    pub fn resolution(&self) -> CaptureResult<Resolution> {
        Resolution::new(self.width, self.height)
    }
}

/// One named session entry in a config file.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SessionConfig {
    /// Registry name.
    pub name: String,
    /// Capture settings, inlined in the JSON entry.
    #[serde(flatten)]
    pub settings: CaptureSettings,
}

/// Top-level config file.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Encoder shared by every session.
    pub encoder: EncoderConfig,
    /// Sessions in registration order.
    pub sessions: Vec<SessionConfig>,
}

impl CaptureConfig {
    /// Parse and validate a config from JSON text.
    pub fn from_json_str(s: &str) -> CaptureResult<Self> {
        let cfg: Self = serde_json::from_str(s)
            .map_err(|e| CaptureError::config(format!("parse capture config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate a config file.
    pub fn from_json_path(path: &Path) -> CaptureResult<Self> {
        use anyhow::Context as _;
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read capture config '{}'", path.display()))?;
        Self::from_json_str(&s)
    }

    /// Session names must be non-empty and unique; every session's settings must validate.
    pub fn validate(&self) -> CaptureResult<()> {
        let mut seen = HashSet::new();
        for s in &self.sessions {
            if s.name.trim().is_empty() {
                return Err(CaptureError::config("session name must be non-empty"));
            }
            if !seen.insert(s.name.as_str()) {
                return Err(CaptureError::config(format!(
                    "duplicate session name '{}'",
                    s.name
                )));
            }
            s.settings
                .validate()
                .map_err(|e| CaptureError::config(format!("session '{}': {e}", s.name)))?;
        }
        Ok(())
    }
}
