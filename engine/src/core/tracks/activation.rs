//! Cue Activation Handler
//!
//! Turns "active cues changed" notifications from the metadata track into
//! metadata events. Hosts may fire the notification once per active cue, so
//! repeated firings for the same latest start time are collapsed.

use serde_json::{Map, Value};
use tracing::trace;

use super::events::TrackEvent;
use crate::core::captions::{Cue, CuePayload, MetadataFrame};
use crate::core::TimeSec;

/// Key used for frames that carry no identifier
const UNKNOWN_FRAME_KEY: &str = "unknown";

/// Decodes a batch of binary metadata frames into one structured payload
pub trait MetadataDecoder: Send + Sync {
    fn decode(&self, frames: &[MetadataFrame]) -> Value;
}

/// Default decoder: a JSON object keyed by frame id.
///
/// Values are the frame's text if present, otherwise its bytes as lossy
/// UTF-8 with trailing NULs removed. Later frames overwrite earlier frames
/// with the same key.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameTableDecoder;

impl MetadataDecoder for FrameTableDecoder {
    fn decode(&self, frames: &[MetadataFrame]) -> Value {
        let mut table = Map::new();
        for frame in frames {
            let key = frame.key.as_deref().filter(|k| !k.is_empty()).unwrap_or(UNKNOWN_FRAME_KEY);
            let value = match &frame.text {
                Some(text) => text.clone(),
                None => String::from_utf8_lossy(&frame.data)
                    .trim_end_matches('\0')
                    .to_string(),
            };
            table.insert(key.to_string(), Value::String(value));
        }
        Value::Object(table)
    }
}

/// Activation state of one session
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CueActivation {
    last_position: Option<TimeSec>,
}

impl CueActivation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start time of the last processed activation
    pub fn last_position(&self) -> Option<TimeSec> {
        self.last_position
    }

    /// Processes the currently active cues, ordered by start time.
    ///
    /// Emits one event per text cue, then a single event for all binary
    /// cues decoded as a batch. Every event carries the latest start time.
    pub fn on_active_cues(&mut self, active: &[Cue], decoder: &dyn MetadataDecoder) -> Vec<TrackEvent> {
        let Some(latest) = active.last() else {
            return Vec::new();
        };
        let start_time = latest.start_time;
        if self.last_position == Some(start_time) {
            trace!(target: "captions", start_time, "Skipping repeated cue activation");
            return Vec::new();
        }

        let mut events = Vec::new();
        let mut frames = Vec::new();
        for cue in active.iter().filter(|cue| cue.start_time >= start_time) {
            match &cue.payload {
                CuePayload::Metadata(frame) => frames.push(frame.clone()),
                CuePayload::Text(text) if !text.is_empty() => events.push(TrackEvent::Metadata {
                    time: start_time,
                    payload: parse_text_payload(text),
                }),
                CuePayload::Text(_) => {}
            }
        }

        if !frames.is_empty() {
            events.push(TrackEvent::Metadata {
                time: start_time,
                payload: decoder.decode(&frames),
            });
        }

        self.last_position = Some(start_time);
        events
    }
}

/// Text payloads are JSON documents; anything else is passed through as a
/// string
fn parse_text_payload(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
