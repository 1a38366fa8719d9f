//! Error types.
//!
//! The read/write tracking path never fails: unknown targets are no-ops,
//! re-entry is short-circuited and deep nesting degrades to full cleanup.
//! Errors only come from configuring the tracker.

use thiserror::Error;

/// Errors raised while configuring dependency tracking.
#[derive(Debug, Error)]
pub enum TrackError {
    /// The marker width does not fit the `u32` marker words.
    #[error("max marker bits must be between 1 and {max}, got {requested}")]
    InvalidMarkerBits { requested: u32, max: u32 },

    /// The configuration document could not be parsed.
    #[error("failed to parse tracker config: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// Configuration changed while effects were running.
    #[error("cannot reconfigure tracking while {depth} effect(s) are running")]
    ConfigureWhileRunning { depth: u32 },
}

pub type Result<T> = std::result::Result<T, TrackError>;
