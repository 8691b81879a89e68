use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },

    #[error("failed to read config file: {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Tunables of the liveness engine.
///
/// The three thresholds drive the verdict; `scale_factor` and `y_offset` only
/// shape the render boxes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LivenessConfig {
    /// Top-left displacement (pixels) between consecutive ticks above which
    /// the subject counts as moving.
    pub movement_threshold: f64,
    /// Consecutive still ticks tolerated before the verdict drops to not-live.
    pub stillness_threshold: u32,
    /// Ratio of current to previous eye distance below which a blink is
    /// recognised.
    pub blink_threshold: f64,
    /// Render box growth factor about the face centre.
    pub scale_factor: f64,
    /// Vertical shift (pixels) applied to render boxes after scaling.
    pub y_offset: f64,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            movement_threshold: 15.0,
            stillness_threshold: 30,
            blink_threshold: 0.5,
            scale_factor: 1.2,
            y_offset: 20.0,
        }
    }
}

impl LivenessConfig {
    /// Requires more motion and tolerates less stillness.
    pub fn strict() -> Self {
        Self {
            movement_threshold: 25.0,
            stillness_threshold: 15,
            blink_threshold: 0.4,
            ..Default::default()
        }
    }

    /// Accepts smaller motion and longer stillness.
    pub fn lenient() -> Self {
        Self {
            movement_threshold: 8.0,
            stillness_threshold: 60,
            blink_threshold: 0.7,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.movement_threshold.is_finite() || self.movement_threshold < 0.0 {
            return Err(ConfigError::Invalid {
                field: "movement_threshold",
                reason: "must be a finite, non-negative number of pixels",
            });
        }
        if !(self.blink_threshold > 0.0 && self.blink_threshold <= 1.0) {
            return Err(ConfigError::Invalid {
                field: "blink_threshold",
                reason: "must be a ratio in (0, 1]",
            });
        }
        if !self.scale_factor.is_finite() || self.scale_factor <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "scale_factor",
                reason: "must be a finite, positive factor",
            });
        }
        if !self.y_offset.is_finite() {
            return Err(ConfigError::Invalid {
                field: "y_offset",
                reason: "must be finite",
            });
        }
        Ok(())
    }

    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }
}
