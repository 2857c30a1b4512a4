//! Editor configuration.

use crate::grid::DEFAULT_CELL_SIZE;
use crate::scene::SerializableColor;
use crate::viewport::ZOOM_STEP;
use kurbo::Size;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Tunables shared by every session. Missing JSON fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Base URL of the relay server; empty means same origin.
    pub server_url: String,
    pub push_debounce_ms: u64,
    pub poll_interval_ms: u64,
    pub zoom_step: f64,
    pub cell_size: f64,
    pub brush_width: f64,
    pub brush_color: String,
    pub viewport: Size,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:5000".to_string(),
            push_debounce_ms: 1000,
            poll_interval_ms: 2000,
            zoom_step: ZOOM_STEP,
            cell_size: DEFAULT_CELL_SIZE,
            brush_width: 5.0,
            brush_color: "#00D2FF".to_string(),
            viewport: Size::new(1280.0, 720.0),
        }
    }
}

impl EditorConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.zoom_step <= 1.0 {
            return Err(ConfigError::Invalid {
                field: "zoom_step",
                reason: format!("{} must be greater than 1", self.zoom_step),
            });
        }
        if !(self.cell_size.is_finite() && self.cell_size > 0.0) {
            return Err(ConfigError::Invalid {
                field: "cell_size",
                reason: format!("{} must be positive", self.cell_size),
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "poll_interval_ms",
                reason: "must be non-zero".to_string(),
            });
        }
        self.brush_color()?;
        Ok(())
    }

    /// Parsed brush color.
    pub fn brush_color(&self) -> Result<SerializableColor, ConfigError> {
        SerializableColor::from_hex(&self.brush_color).ok_or_else(|| ConfigError::Invalid {
            field: "brush_color",
            reason: format!("{:?} is not a hex color", self.brush_color),
        })
    }
}
