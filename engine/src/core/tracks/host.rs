//! Host Media Surface
//!
//! The engine reads the host's native track list only through copy-on-notify
//! snapshots and changes host tracks only through the operations of
//! [`MediaHost`].

use std::collections::{HashMap, HashSet};

use super::models::{NativeTrackHandle, NativeTrackSnapshot, TrackKind, TrackMode};
use crate::core::captions::Cue;
use crate::core::{TimeSec, TrackId};

/// Host notifications the engine subscribes to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HostTopic {
    /// The native track list or a track's mode changed
    TrackListChanged,
    /// The active cues of one track changed
    ActiveCuesChanged(NativeTrackHandle),
}

/// Media element that owns the native text tracks
pub trait MediaHost {
    /// Whether the active playback backend renders text tracks natively
    fn native_rendering_supported(&self) -> bool;

    /// Snapshot of the native track list
    fn text_tracks(&self) -> Vec<NativeTrackSnapshot>;

    /// Creates a native track. The label cannot be changed afterwards and
    /// host tracks cannot be removed.
    fn add_text_track(&mut self, kind: TrackKind, label: &str, language: &str) -> NativeTrackHandle;

    fn set_track_mode(&mut self, handle: NativeTrackHandle, mode: TrackMode);

    fn add_cue(&mut self, handle: NativeTrackHandle, cue: &Cue);

    /// Removes every cue from a track. Only guaranteed while the track is
    /// hidden.
    fn remove_cues(&mut self, handle: NativeTrackHandle);

    fn subscribe(&mut self, topic: HostTopic);

    fn unsubscribe(&mut self, topic: HostTopic);
}

// =============================================================================
// Native Bindings
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct NativeBinding {
    pub id: TrackId,
    pub in_use: bool,
}

/// Which engine id each host track carries.
///
/// Host tracks outlive sessions, so bindings survive `clear`; a retired
/// track stays recognisable until a new session reuses it.
#[derive(Debug, Default)]
pub(crate) struct NativeBindings {
    entries: HashMap<NativeTrackHandle, NativeBinding>,
}

impl NativeBindings {
    pub fn get(&self, handle: NativeTrackHandle) -> Option<&NativeBinding> {
        self.entries.get(&handle)
    }

    pub fn bind(&mut self, handle: NativeTrackHandle, id: &str) {
        self.entries.insert(
            handle,
            NativeBinding {
                id: id.to_string(),
                in_use: true,
            },
        );
    }

    pub fn retire(&mut self, handle: NativeTrackHandle) {
        if let Some(binding) = self.entries.get_mut(&handle) {
            binding.in_use = false;
        }
    }

    /// Selectable host tracks that are in use or not yet seen
    pub fn admissible(&self, snapshot: &NativeTrackSnapshot) -> bool {
        snapshot.kind.is_selectable() && self.get(snapshot.handle).map_or(true, |b| b.in_use)
    }
}

// =============================================================================
// In-Memory Host
// =============================================================================

/// One track of a [`MemoryHost`]
#[derive(Clone, Debug, PartialEq)]
pub struct MemoryTrack {
    pub handle: NativeTrackHandle,
    pub kind: TrackKind,
    pub label: String,
    pub language: String,
    pub mode: TrackMode,
    pub cues: Vec<Cue>,
    pub embedded: bool,
}

impl MemoryTrack {
    fn snapshot(&self) -> NativeTrackSnapshot {
        NativeTrackSnapshot {
            handle: self.handle,
            kind: self.kind,
            label: self.label.clone(),
            language: self.language.clone(),
            mode: self.mode,
            cue_count: self.cues.len(),
            embedded: self.embedded,
        }
    }
}

/// Headless host surface keeping its native track list in memory
#[derive(Clone, Debug, Default)]
pub struct MemoryHost {
    native_rendering: bool,
    tracks: Vec<MemoryTrack>,
    subscriptions: HashSet<HostTopic>,
    next_handle: u64,
}

impl MemoryHost {
    pub fn new(native_rendering: bool) -> Self {
        Self {
            native_rendering,
            ..Default::default()
        }
    }

    pub fn set_native_rendering(&mut self, native_rendering: bool) {
        self.native_rendering = native_rendering;
    }

    /// Adds a track the backend extracted from the media container
    pub fn push_embedded_track(&mut self, kind: TrackKind, label: &str) -> NativeTrackHandle {
        let handle = self.allocate(kind, label, "");
        if let Some(track) = self.track_mut(handle) {
            track.embedded = true;
        }
        handle
    }

    /// Adds a cue on behalf of the backend
    pub fn push_cue(&mut self, handle: NativeTrackHandle, cue: Cue) {
        if let Some(track) = self.track_mut(handle) {
            track.cues.push(cue);
        }
    }

    /// Changes a mode the way a platform picker would
    pub fn set_mode_externally(&mut self, handle: NativeTrackHandle, mode: TrackMode) {
        if let Some(track) = self.track_mut(handle) {
            track.mode = mode;
        }
    }

    pub fn track(&self, handle: NativeTrackHandle) -> Option<&MemoryTrack> {
        self.tracks.iter().find(|t| t.handle == handle)
    }

    pub fn track_by_label(&self, label: &str) -> Option<&MemoryTrack> {
        self.tracks.iter().find(|t| t.label == label)
    }

    pub fn tracks(&self) -> &[MemoryTrack] {
        &self.tracks
    }

    /// Cues of a track active at the given time, ordered by start time
    pub fn active_cues(&self, handle: NativeTrackHandle, time_sec: TimeSec) -> Vec<Cue> {
        let mut active: Vec<Cue> = self
            .track(handle)
            .map(|track| track.cues.iter().filter(|c| c.is_active_at(time_sec)).cloned().collect())
            .unwrap_or_default();
        active.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        active
    }

    pub fn is_subscribed(&self, topic: HostTopic) -> bool {
        self.subscriptions.contains(&topic)
    }

    fn allocate(&mut self, kind: TrackKind, label: &str, language: &str) -> NativeTrackHandle {
        self.next_handle += 1;
        let handle = NativeTrackHandle(self.next_handle);
        self.tracks.push(MemoryTrack {
            handle,
            kind,
            label: label.to_string(),
            language: language.to_string(),
            mode: TrackMode::Disabled,
            cues: Vec::new(),
            embedded: false,
        });
        handle
    }

    fn track_mut(&mut self, handle: NativeTrackHandle) -> Option<&mut MemoryTrack> {
        self.tracks.iter_mut().find(|t| t.handle == handle)
    }
}

impl MediaHost for MemoryHost {
    fn native_rendering_supported(&self) -> bool {
        self.native_rendering
    }

    fn text_tracks(&self) -> Vec<NativeTrackSnapshot> {
        self.tracks.iter().map(MemoryTrack::snapshot).collect()
    }

    fn add_text_track(&mut self, kind: TrackKind, label: &str, language: &str) -> NativeTrackHandle {
        self.allocate(kind, label, language)
    }

    fn set_track_mode(&mut self, handle: NativeTrackHandle, mode: TrackMode) {
        self.set_mode_externally(handle, mode);
    }

    fn add_cue(&mut self, handle: NativeTrackHandle, cue: &Cue) {
        self.push_cue(handle, cue.clone());
    }

    fn remove_cues(&mut self, handle: NativeTrackHandle) {
        if let Some(track) = self.track_mut(handle) {
            if track.mode == TrackMode::Hidden {
                track.cues.clear();
            }
        }
    }

    fn subscribe(&mut self, topic: HostTopic) {
        self.subscriptions.insert(topic);
    }

    fn unsubscribe(&mut self, topic: HostTopic) {
        self.subscriptions.remove(&topic);
    }
}
