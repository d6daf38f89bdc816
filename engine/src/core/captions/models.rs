//! Cue Data Models
//!
//! Defines the canonical cue representation shared by every source format.
//!
//! # Overview
//!
//! Cues reach the engine from:
//! - Sideloaded track files (SRT, WebVTT, DFXP)
//! - Embedded caption streams decoded by the playback backend
//! - In-band binary metadata (ID3-style frames)

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::core::TimeSec;

// =============================================================================
// Metadata Frames
// =============================================================================

/// One binary metadata frame carried by a metadata cue
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MetadataFrame {
    /// Frame identifier (e.g. `TXXX`, `PRIV`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Text value when the backend already decoded the frame
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Raw frame bytes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<u8>,
}

impl MetadataFrame {
    /// Creates a frame from raw bytes
    pub fn new(key: &str, data: Vec<u8>) -> Self {
        Self {
            key: Some(key.to_string()),
            text: None,
            data,
        }
    }

    /// Creates a frame whose value is already text
    pub fn text(key: &str, text: &str) -> Self {
        Self {
            key: Some(key.to_string()),
            text: Some(text.to_string()),
            data: Vec::new(),
        }
    }

    /// Stable signature used for cue deduplication
    pub fn signature(&self) -> String {
        let mut hasher = DefaultHasher::new();
        self.data.hash(&mut hasher);
        format!(
            "{}|{}|{:016x}",
            self.key.as_deref().unwrap_or_default(),
            self.text.as_deref().unwrap_or_default(),
            hasher.finish()
        )
    }
}

// =============================================================================
// Cue Payload
// =============================================================================

/// Payload of a cue: caption text or a binary metadata frame
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "value")]
pub enum CuePayload {
    Text(String),
    Metadata(MetadataFrame),
}

impl CuePayload {
    /// Returns the caption text, if this is a text payload
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Metadata(_) => None,
        }
    }

    /// Returns the metadata frame, if this is a binary payload
    pub fn as_metadata(&self) -> Option<&MetadataFrame> {
        match self {
            Self::Metadata(frame) => Some(frame),
            Self::Text(_) => None,
        }
    }

    pub fn signature(&self) -> String {
        match self {
            Self::Text(text) => format!("text:{}", text),
            Self::Metadata(frame) => format!("meta:{}", frame.signature()),
        }
    }
}

// =============================================================================
// Cue Entry
// =============================================================================

/// A single timed entry within a track
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cue {
    /// Start time in seconds
    pub start_time: TimeSec,
    /// End time in seconds
    pub end_time: TimeSec,
    /// Cue payload
    pub payload: CuePayload,
}

impl Cue {
    /// Creates a text cue
    pub fn text(start_time: TimeSec, end_time: TimeSec, text: &str) -> Self {
        Self {
            start_time,
            end_time,
            payload: CuePayload::Text(text.to_string()),
        }
    }

    /// Creates a binary metadata cue
    pub fn metadata(start_time: TimeSec, end_time: TimeSec, frame: MetadataFrame) -> Self {
        Self {
            start_time,
            end_time,
            payload: CuePayload::Metadata(frame),
        }
    }

    /// Returns the duration of this cue in seconds
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Returns true if the cue is active at the given time
    pub fn is_active_at(&self, time_sec: TimeSec) -> bool {
        time_sec >= self.start_time && time_sec < self.end_time
    }

    /// Checks the timing invariant: finite, non-negative, `end > start`
    pub fn has_valid_timing(&self) -> bool {
        self.start_time.is_finite()
            && self.end_time.is_finite()
            && self.start_time >= 0.0
            && self.end_time > self.start_time
    }
}

// =============================================================================
// Raw Cue Tuple
// =============================================================================

/// Format-neutral cue tuple produced by parsers and playback backends.
///
/// Every field is optional because upstream data may be partial; the cue
/// converter drops tuples that are missing any of them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawCue {
    /// Start time in seconds
    #[serde(default)]
    pub begin: Option<TimeSec>,
    /// End time in seconds
    #[serde(default)]
    pub end: Option<TimeSec>,
    /// Caption text
    #[serde(default)]
    pub text: Option<String>,
}

impl RawCue {
    pub fn new(begin: TimeSec, end: TimeSec, text: &str) -> Self {
        Self {
            begin: Some(begin),
            end: Some(end),
            text: Some(text.to_string()),
        }
    }
}
