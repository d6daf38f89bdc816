//! Track Events
//!
//! Outbound notifications consumed by selection UIs and metadata listeners,
//! published on a broadcast bus so any number of subscribers can observe
//! them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use super::models::Track;
use crate::core::TimeSec;

/// Default capacity of the event channel
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Event emitted by the track manager
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum TrackEvent {
    /// The selectable track list is ready for a menu
    #[serde(rename = "subtitlesTracks")]
    TracksAvailable { tracks: Vec<Track> },

    /// The selected track changed; `current_track` is the 1-based menu index
    #[serde(rename = "subtitlesTrackChanged", rename_all = "camelCase")]
    SelectionChanged {
        current_track: usize,
        tracks: Vec<Track>,
    },

    /// Timed metadata became active
    #[serde(rename = "meta")]
    Metadata {
        #[serde(rename = "metadataTime")]
        time: TimeSec,
        #[serde(rename = "metadata")]
        payload: Value,
    },
}

impl TrackEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            Self::TracksAvailable { .. } => "subtitlesTracks",
            Self::SelectionChanged { .. } => "subtitlesTrackChanged",
            Self::Metadata { .. } => "meta",
        }
    }
}

/// Broadcast bus for [`TrackEvent`]s.
///
/// Publishing never blocks and silently drops events when nobody is
/// subscribed. Slow subscribers observe `RecvError::Lagged`.
#[derive(Clone, Debug)]
pub struct TrackEventBus {
    tx: broadcast::Sender<TrackEvent>,
}

impl Default for TrackEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl TrackEventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: TrackEvent) {
        let _ = self.tx.send(event);
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TrackEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
