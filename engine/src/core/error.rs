//! Captrack Error Definitions
//!
//! Defines error types used throughout the engine.

use thiserror::Error;

use super::{captions::ParseError, TrackId};

/// Core engine error types
#[derive(Error, Debug)]
pub enum CoreError {
    // =========================================================================
    // Load Errors
    // =========================================================================
    #[error("Fetch failed for {url}: {reason}")]
    FetchFailed { url: String, reason: String },

    #[error("Fetch timed out after {timeout_ms}ms: {url}")]
    FetchTimeout { url: String, timeout_ms: u64 },

    #[error("Parse failed: {0}")]
    Parse(#[from] ParseError),

    // =========================================================================
    // Track Errors
    // =========================================================================
    #[error("Track not found: {0}")]
    TrackNotFound(TrackId),

    #[error("Unsupported track kind: {0}")]
    UnsupportedKind(String),

    #[error("Invalid cue: {0}")]
    InvalidCue(String),

    // =========================================================================
    // General Errors
    // =========================================================================
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Core engine result type
pub type CoreResult<T> = Result<T, CoreError>;
