//! Controller configuration, read from TOML.

use serde::{Deserialize, Serialize};

use pg_ir::{TrackColor, DEFAULT_BEATS_PER_BAR, DEFAULT_BPM};

use crate::ControllerError;

/// Settings for new documents and loop expansion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Tempo of a new sequence.
    pub default_bpm: f64,

    /// Beats per bar of a new sequence.
    pub beats_per_bar: u8,

    /// How many bars past the end of the file infinite loops are expanded.
    pub loop_horizon_bars: u64,

    /// First colour handed to new tracks.
    pub default_color: TrackColor,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_bpm: DEFAULT_BPM as f64,
            beats_per_bar: DEFAULT_BEATS_PER_BAR as u8,
            loop_horizon_bars: 16,
            default_color: TrackColor::default(),
        }
    }
}

impl Config {
    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml(toml_str: &str) -> Result<Self, ControllerError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| ControllerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ControllerError> {
        toml::to_string_pretty(self).map_err(|e| ControllerError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ControllerError> {
        if !(self.default_bpm > 0.0 && self.default_bpm.is_finite()) {
            return Err(ControllerError::Config("default_bpm must be positive".to_string()));
        }
        if self.beats_per_bar == 0 {
            return Err(ControllerError::Config("beats_per_bar cannot be zero".to_string()));
        }
        if self.loop_horizon_bars == 0 {
            return Err(ControllerError::Config("loop_horizon_bars cannot be zero".to_string()));
        }
        Ok(())
    }
}
