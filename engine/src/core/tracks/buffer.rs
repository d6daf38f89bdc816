//! Pending Cue Buffer
//!
//! Holds cues that were parsed before their destination track was
//! registered, and flushes them exactly once when the track appears.

use std::collections::HashMap;

use tracing::debug;

use super::registry::TrackRegistry;
use crate::core::captions::Cue;
use crate::core::TrackId;

#[derive(Debug, Default)]
struct PendingCues {
    cues: Vec<Cue>,
    flushed: bool,
}

/// Cues waiting for their track, keyed by track id
#[derive(Debug, Default)]
pub struct CueBuffer {
    entries: HashMap<TrackId, PendingCues>,
}

impl CueBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores cues for a track that is not yet resolvable.
    ///
    /// Appends to an unflushed entry; a flushed entry is replaced, since the
    /// cues it carried already reached their track.
    pub fn stage(&mut self, track_id: &str, cues: Vec<Cue>) {
        let entry = self.entries.entry(track_id.to_string()).or_default();
        if entry.flushed {
            *entry = PendingCues::default();
        }
        entry.cues.extend(cues);
        debug!(target: "captions", track_id, staged = entry.cues.len(), "Staged cues for pending track");
    }

    /// Moves staged cues onto the live track in their original order.
    ///
    /// Returns the cues that were delivered. Subsequent calls are no-ops
    /// until new cues are staged. If the track is still missing the cues
    /// stay pending.
    pub fn flush_if_pending(&mut self, track_id: &str, registry: &mut TrackRegistry) -> Vec<Cue> {
        let Some(entry) = self.entries.get_mut(track_id) else {
            return Vec::new();
        };
        if entry.flushed || !registry.contains(track_id) {
            return Vec::new();
        }

        let cues = std::mem::take(&mut entry.cues);
        entry.flushed = true;
        match registry.append_cues(track_id, cues) {
            Ok(delivered) => {
                debug!(target: "captions", track_id, count = delivered.len(), "Flushed pending cues");
                delivered
            }
            Err(_) => Vec::new(),
        }
    }

    /// Returns true if cues for the track were already delivered
    pub fn is_flushed(&self, track_id: &str) -> bool {
        self.entries.get(track_id).is_some_and(|entry| entry.flushed)
    }

    /// Records that cues for the track were delivered outside the buffer
    pub fn mark_flushed(&mut self, track_id: &str) {
        let entry = self.entries.entry(track_id.to_string()).or_default();
        entry.cues.clear();
        entry.flushed = true;
    }

    /// Returns true if unflushed cues are waiting for the track
    pub fn has_pending(&self, track_id: &str) -> bool {
        self.entries
            .get(track_id)
            .is_some_and(|entry| !entry.flushed && !entry.cues.is_empty())
    }

    /// Ids of tracks with unflushed cues
    pub fn pending_ids(&self) -> Vec<TrackId> {
        self.entries
            .iter()
            .filter(|(_, entry)| !entry.flushed)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
