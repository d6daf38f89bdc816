//! Track Registry
//!
//! Authoritative id -> track mapping plus the ordered list of selectable
//! tracks. Owns identity assignment, duplicate rejection and cue
//! deduplication.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::models::{ItemTrack, NativeTrackSnapshot, Track, TrackKind};
use crate::core::captions::Cue;
use crate::core::types::first_non_empty;
use crate::core::{CoreError, CoreResult, TrackId};

/// Well-known id of the single native captions track
pub const NATIVE_CAPTIONS_ID: &str = "native-captions";

/// Well-known id of the single native metadata track
pub const NATIVE_METADATA_ID: &str = "native-metadata";

/// Group id of externally grouped subtitle renditions
pub const SUBTITLE_GROUP_ID: &str = "subs";

/// Id prefix used when a track declares no kind
const UNKNOWN_KIND_PREFIX: &str = "cc";

/// Returns the fixed id for runtime-native tracks of the given kind
pub fn native_track_id(kind: TrackKind) -> Option<&'static str> {
    match kind {
        TrackKind::Captions => Some(NATIVE_CAPTIONS_ID),
        TrackKind::Metadata => Some(NATIVE_METADATA_ID),
        _ => None,
    }
}

/// Identity of one cue on one track
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct CueKey {
    track_id: TrackId,
    start: u64,
    end: u64,
    signature: String,
}

impl CueKey {
    fn new(track_id: &str, cue: &Cue) -> Self {
        Self {
            track_id: track_id.to_string(),
            start: cue.start_time.to_bits(),
            end: cue.end_time.to_bits(),
            signature: cue.payload.signature(),
        }
    }
}

/// Session track registry
#[derive(Debug, Default)]
pub struct TrackRegistry {
    tracks: HashMap<TrackId, Track>,
    order: Vec<TrackId>,
    cue_keys: HashSet<CueKey>,
}

impl TrackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Identity
    // =========================================================================

    /// Resolves the id of an item-declared track.
    ///
    /// An explicit id always wins; otherwise the first non-empty of name,
    /// file and label, falling back to the kind prefix plus the current
    /// number of listed tracks.
    pub fn assign_identity(&self, item: &ItemTrack) -> TrackId {
        first_non_empty([
            item.id.as_deref(),
            item.name.as_deref(),
            item.file.as_deref(),
            item.label.as_deref(),
        ])
        .map(str::to_string)
        .unwrap_or_else(|| {
            let prefix = item.kind.map_or(UNKNOWN_KIND_PREFIX, |kind| kind.as_str());
            format!("{}{}", prefix, self.order.len())
        })
    }

    /// Resolves the id of a track first seen on the host's native list
    pub fn assign_native_identity(&self, snapshot: &NativeTrackSnapshot) -> TrackId {
        if let Some(id) = native_track_id(snapshot.kind) {
            return id.to_string();
        }
        first_non_empty([Some(snapshot.label.as_str())])
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}{}", snapshot.kind.as_str(), self.order.len()))
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Appends a selectable track. Returns false if the id is already taken.
    pub fn register(&mut self, track: Track) -> bool {
        if self.tracks.contains_key(&track.id) {
            debug!(target: "captions", track_id = %track.id, "Ignoring duplicate track");
            return false;
        }
        self.order.push(track.id.clone());
        self.tracks.insert(track.id.clone(), track);
        true
    }

    /// Indexes a track by id without listing it (metadata tracks)
    pub fn register_unlisted(&mut self, track: Track) -> bool {
        if self.tracks.contains_key(&track.id) {
            return false;
        }
        self.tracks.insert(track.id.clone(), track);
        true
    }

    /// Destructively reseeds the registry with only the embedded and
    /// externally grouped listed tracks. Cue identities are forgotten.
    pub fn rebuild_as_non_native(&mut self) {
        let previous = std::mem::take(&mut self.order);
        let mut tracks = std::mem::take(&mut self.tracks);
        self.cue_keys.clear();

        for id in previous {
            let Some(track) = tracks.remove(&id) else {
                continue;
            };
            let grouped = track.group_id.as_deref() == Some(SUBTITLE_GROUP_ID);
            if track.embedded || grouped {
                self.order.push(id.clone());
                self.tracks.insert(id, track);
            }
        }

        debug!(target: "captions", kept = self.order.len(), "Reseeded track registry");
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    pub fn resolve(&self, id: &str) -> Option<&Track> {
        self.tracks.get(id)
    }

    pub fn resolve_mut(&mut self, id: &str) -> Option<&mut Track> {
        self.tracks.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tracks.contains_key(id)
    }

    /// Returns the listed track at a selection index
    pub fn track_at(&self, index: usize) -> Option<&Track> {
        self.order.get(index).and_then(|id| self.tracks.get(id))
    }

    pub fn track_at_mut(&mut self, index: usize) -> Option<&mut Track> {
        let id = self.order.get(index)?;
        self.tracks.get_mut(id)
    }

    /// Returns the selection index of a listed track
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.order.iter().position(|listed| listed == id)
    }

    /// Iterates listed tracks in order
    pub fn listed(&self) -> impl Iterator<Item = &Track> {
        self.order.iter().filter_map(|id| self.tracks.get(id))
    }

    /// Clones the listed tracks in order
    pub fn snapshot(&self) -> Vec<Track> {
        self.listed().cloned().collect()
    }

    /// Returns every track, listed or not
    pub fn all(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }

    /// Returns the number of listed tracks
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if no tracks are listed
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    // =========================================================================
    // Cues
    // =========================================================================

    /// Appends a cue batch to a track.
    ///
    /// Cues already on the track are skipped, the rest are sorted by start
    /// time and merged in without reordering existing cues. Returns the
    /// accepted cues in ascending order.
    pub fn append_cues(&mut self, id: &str, batch: Vec<Cue>) -> CoreResult<Vec<Cue>> {
        let track = self
            .tracks
            .get_mut(id)
            .ok_or_else(|| CoreError::TrackNotFound(id.to_string()))?;

        let mut accepted: Vec<Cue> = batch
            .into_iter()
            .filter(|cue| self.cue_keys.insert(CueKey::new(id, cue)))
            .collect();
        accepted.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));

        for cue in &accepted {
            let position = track
                .cues
                .partition_point(|existing| existing.start_time <= cue.start_time);
            track.cues.insert(position, cue.clone());
        }

        Ok(accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tracks::models::{NativeTrackHandle, TrackMode};

    fn subtitles(id: &str) -> Track {
        Track::sideloaded(id, TrackKind::Subtitles, id)
    }

    fn starts(track: &Track) -> Vec<f64> {
        track.cues.iter().map(|c| c.start_time).collect()
    }

    #[test]
    fn test_explicit_id_is_stable() {
        let registry = TrackRegistry::new();
        let item = ItemTrack::new(TrackKind::Captions)
            .with_id("en")
            .with_label("English")
            .with_file("en.vtt");
        assert_eq!(registry.assign_identity(&item), "en");
    }

    #[test]
    fn test_identity_fallback_chain() {
        let mut registry = TrackRegistry::new();
        let mut item = ItemTrack::new(TrackKind::Subtitles)
            .with_label("English")
            .with_file("en.vtt");
        item.name = Some(String::new());
        assert_eq!(registry.assign_identity(&item), "en.vtt");

        item.file = None;
        assert_eq!(registry.assign_identity(&item), "English");

        item.label = None;
        assert_eq!(registry.assign_identity(&item), "subtitles0");

        registry.register(subtitles("other"));
        assert_eq!(registry.assign_identity(&item), "subtitles1");

        assert_eq!(registry.assign_identity(&ItemTrack::default()), "cc1");
    }

    #[test]
    fn test_native_identity() {
        let registry = TrackRegistry::new();
        let snapshot = |kind, label: &str| NativeTrackSnapshot {
            handle: NativeTrackHandle(1),
            kind,
            label: label.to_string(),
            language: String::new(),
            mode: TrackMode::Disabled,
            cue_count: 0,
            embedded: true,
        };
        assert_eq!(
            registry.assign_native_identity(&snapshot(TrackKind::Captions, "CC1")),
            NATIVE_CAPTIONS_ID
        );
        assert_eq!(
            registry.assign_native_identity(&snapshot(TrackKind::Metadata, "")),
            NATIVE_METADATA_ID
        );
        assert_eq!(
            registry.assign_native_identity(&snapshot(TrackKind::Subtitles, "Deutsch")),
            "Deutsch"
        );
        assert_eq!(
            registry.assign_native_identity(&snapshot(TrackKind::Subtitles, "")),
            "subtitles0"
        );
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut registry = TrackRegistry::new();
        assert!(registry.register(subtitles("en")));
        assert!(!registry.register(Track::sideloaded("en", TrackKind::Captions, "Other")));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.resolve("en").unwrap().kind, TrackKind::Subtitles);
    }

    #[test]
    fn test_unlisted_tracks_are_resolvable_but_not_selectable() {
        let mut registry = TrackRegistry::new();
        let metadata = Track::native(
            NATIVE_METADATA_ID,
            TrackKind::Metadata,
            "ID3 Metadata",
            NativeTrackHandle(3),
        );
        assert!(registry.register_unlisted(metadata));
        assert!(registry.contains(NATIVE_METADATA_ID));
        assert!(registry.is_empty());
        assert!(!registry.register(Track::sideloaded(
            NATIVE_METADATA_ID,
            TrackKind::Metadata,
            "dup"
        )));
    }

    #[test]
    fn test_rebuild_keeps_embedded_and_grouped_tracks() {
        let mut registry = TrackRegistry::new();
        registry.register(subtitles("sideloaded"));
        let mut embedded = subtitles("embedded");
        embedded.embedded = true;
        registry.register(embedded);
        let mut grouped = subtitles("grouped");
        grouped.group_id = Some(SUBTITLE_GROUP_ID.to_string());
        registry.register(grouped);
        registry.register_unlisted(Track::sideloaded("meta", TrackKind::Metadata, "m"));
        registry.append_cues("embedded", vec![Cue::text(0.0, 1.0, "a")]).unwrap();

        registry.rebuild_as_non_native();

        let ids: Vec<_> = registry.listed().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["embedded", "grouped"]);
        assert!(!registry.contains("sideloaded"));
        assert!(!registry.contains("meta"));
        // identities were forgotten, so the same cue is accepted again
        let accepted = registry
            .append_cues("embedded", vec![Cue::text(0.0, 1.0, "a")])
            .unwrap();
        assert_eq!(accepted.len(), 1);
    }

    #[test]
    fn test_append_cues_deduplicates() {
        let mut registry = TrackRegistry::new();
        registry.register(subtitles("en"));
        let batch = vec![Cue::text(0.0, 1.0, "a"), Cue::text(1.0, 2.0, "b")];

        assert_eq!(registry.append_cues("en", batch.clone()).unwrap().len(), 2);
        assert!(registry.append_cues("en", batch).unwrap().is_empty());
        assert_eq!(registry.resolve("en").unwrap().len(), 2);
    }

    #[test]
    fn test_same_cue_on_different_tracks_is_not_a_duplicate() {
        let mut registry = TrackRegistry::new();
        registry.register(subtitles("en"));
        registry.register(subtitles("fr"));
        let cue = Cue::text(0.0, 1.0, "same");
        assert_eq!(registry.append_cues("en", vec![cue.clone()]).unwrap().len(), 1);
        assert_eq!(registry.append_cues("fr", vec![cue]).unwrap().len(), 1);
    }

    #[test]
    fn test_append_cues_keeps_global_order() {
        let mut registry = TrackRegistry::new();
        registry.register(subtitles("en"));
        registry
            .append_cues("en", vec![Cue::text(10.0, 11.0, "c"), Cue::text(12.0, 13.0, "d")])
            .unwrap();
        registry
            .append_cues("en", vec![Cue::text(1.0, 2.0, "a"), Cue::text(11.0, 12.0, "x")])
            .unwrap();
        registry
            .append_cues("en", vec![Cue::text(5.0, 6.0, "b"), Cue::text(20.0, 21.0, "e")])
            .unwrap();

        assert_eq!(
            starts(registry.resolve("en").unwrap()),
            vec![1.0, 5.0, 10.0, 11.0, 12.0, 20.0]
        );
    }

    #[test]
    fn test_append_cues_unknown_track() {
        let mut registry = TrackRegistry::new();
        let result = registry.append_cues("missing", vec![Cue::text(0.0, 1.0, "a")]);
        assert!(matches!(result, Err(CoreError::TrackNotFound(_))));
    }

    #[test]
    fn test_index_lookup() {
        let mut registry = TrackRegistry::new();
        registry.register(subtitles("a"));
        registry.register(subtitles("b"));
        assert_eq!(registry.index_of("b"), Some(1));
        assert_eq!(registry.track_at(0).unwrap().id, "a");
        assert!(registry.track_at(2).is_none());
    }
}
