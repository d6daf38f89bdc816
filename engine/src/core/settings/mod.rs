//! Caption Engine Settings
//!
//! Configuration supplied by the embedder when a manager is built.
//! Missing fields take defaults and out-of-range values are corrected
//! rather than rejected. The engine never reads or writes settings files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::CoreResult;

/// Engine settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CaptionSettings {
    /// Label for tracks that declare no label, name or language.
    /// Repeats are suffixed ` [n]`.
    #[serde(default = "default_unknown_label")]
    pub unknown_label: String,

    /// Label of the native metadata track
    #[serde(default = "default_metadata_label")]
    pub metadata_label: String,

    /// Source recorded on embedded caption tracks timed by decode timestamps
    #[serde(default = "default_caption_source")]
    pub default_caption_source: String,

    /// Capacity of the event broadcast channel
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Timeout for a single track fetch in milliseconds
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
}

fn default_unknown_label() -> String {
    "Unknown CC".to_string()
}

fn default_metadata_label() -> String {
    "ID3 Metadata".to_string()
}

fn default_caption_source() -> String {
    "mpegts".to_string()
}

fn default_event_capacity() -> usize {
    64
}

fn default_fetch_timeout_ms() -> u64 {
    30_000
}

impl Default for CaptionSettings {
    fn default() -> Self {
        Self {
            unknown_label: default_unknown_label(),
            metadata_label: default_metadata_label(),
            default_caption_source: default_caption_source(),
            event_capacity: default_event_capacity(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
        }
    }
}

impl CaptionSettings {
    /// Parses settings from a JSON document, filling in defaults and
    /// normalizing the result
    pub fn from_json(json: &str) -> CoreResult<Self> {
        let mut settings: Self = serde_json::from_str(json)?;
        settings.normalize();
        Ok(settings)
    }

    /// Corrects out-of-range or empty values instead of failing
    pub fn normalize(&mut self) {
        normalize_label(&mut self.unknown_label, default_unknown_label);
        normalize_label(&mut self.metadata_label, default_metadata_label);
        normalize_label(&mut self.default_caption_source, default_caption_source);

        self.event_capacity = self.event_capacity.clamp(1, 4096);
        self.fetch_timeout_ms = self.fetch_timeout_ms.clamp(100, 600_000);
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

fn normalize_label(value: &mut String, fallback: fn() -> String) {
    let trimmed = value.trim();
    *value = if trimmed.is_empty() {
        fallback()
    } else {
        trimmed.to_string()
    };
}
