//! Tracker configuration.
//!
//! ```rust
//! use reflex_core::config::TrackerConfig;
//!
//! let config = TrackerConfig::from_json_str(r#"{ "maxMarkerBits": 12 }"#).unwrap();
//! assert_eq!(config.max_marker_bits, 12);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackError};

/// Highest generation bit a `u32` marker word can hold (bit 0 is unused).
pub const MARKER_WORD_BITS: u32 = u32::BITS - 1;

/// Default nesting depth that uses bit markers.
pub const DEFAULT_MAX_MARKER_BITS: u32 = 30;

/// Settings for the dependency tracker of one thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackerConfig {
    /// Nesting depth up to which effect runs use bit markers for
    /// incremental cleanup. Deeper runs re-subscribe from scratch.
    pub max_marker_bits: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_marker_bits: DEFAULT_MAX_MARKER_BITS,
        }
    }
}

impl TrackerConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_max_marker_bits(mut self, bits: u32) -> Self {
        self.max_marker_bits = bits;
        self
    }

    /// Check that the marker width fits the marker words.
    pub fn validate(&self) -> Result<()> {
        if self.max_marker_bits == 0 || self.max_marker_bits > MARKER_WORD_BITS {
            return Err(TrackError::InvalidMarkerBits {
                requested: self.max_marker_bits,
                max: MARKER_WORD_BITS,
            });
        }
        Ok(())
    }
}
