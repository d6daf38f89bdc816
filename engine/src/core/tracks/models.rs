//! Track Data Models
//!
//! Defines tracks as the engine sees them, the tracks a media item declares,
//! and the snapshots a host surface reports for its native track list.

use serde::{Deserialize, Serialize};

use crate::core::captions::Cue;
use crate::core::{TimeSec, TrackId};

// =============================================================================
// Kinds and Modes
// =============================================================================

/// Kind of a text track
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Subtitles,
    Captions,
    Metadata,
    Chapters,
    Descriptions,
    /// Any kind the engine does not know about
    #[serde(other)]
    Other,
}

impl TrackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Subtitles => "subtitles",
            Self::Captions => "captions",
            Self::Metadata => "metadata",
            Self::Chapters => "chapters",
            Self::Descriptions => "descriptions",
            Self::Other => "other",
        }
    }

    /// Kinds that may appear in the selectable captions menu
    pub fn is_selectable(&self) -> bool {
        matches!(self, Self::Subtitles | Self::Captions)
    }
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rendering mode of a text track
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TrackMode {
    #[default]
    Disabled,
    Hidden,
    Showing,
}

// =============================================================================
// Host Handles
// =============================================================================

/// Opaque identifier of a track object on the host surface
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NativeTrackHandle(pub u64);

/// Where a track's cues live
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum TrackBacking {
    /// Host-owned native track; cues are delivered to the host
    #[serde(rename_all = "camelCase")]
    Native { handle: NativeTrackHandle },
    /// Engine-owned track, optionally loaded from a file
    #[serde(rename_all = "camelCase")]
    Sideloaded { file: Option<String> },
}

// =============================================================================
// Track
// =============================================================================

/// One caption, subtitle or metadata stream
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    /// Identifier, unique within a session
    pub id: TrackId,
    pub kind: TrackKind,
    /// Menu label
    pub label: String,
    /// Language code (e.g., "en", "ko", "ja")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Whether cues come from in-band/container data
    pub embedded: bool,
    /// Origin identifier (e.g. the muxer that produced an embedded track)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// External rendition group (e.g. `subs`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    /// Whether the item marked this track as its default
    pub default: bool,
    pub mode: TrackMode,
    /// Cues in ascending start time order.
    ///
    /// For native tracks this mirrors the cues the engine delivered to the host.
    pub cues: Vec<Cue>,
    pub backing: TrackBacking,
}

impl Track {
    /// Creates an engine-owned track
    pub fn sideloaded(id: &str, kind: TrackKind, label: &str) -> Self {
        Self::with_backing(id, kind, label, TrackBacking::Sideloaded { file: None })
    }

    /// Creates a track backed by a host track object
    pub fn native(id: &str, kind: TrackKind, label: &str, handle: NativeTrackHandle) -> Self {
        Self::with_backing(id, kind, label, TrackBacking::Native { handle })
    }

    fn with_backing(id: &str, kind: TrackKind, label: &str, backing: TrackBacking) -> Self {
        Self {
            id: id.to_string(),
            kind,
            label: label.to_string(),
            language: None,
            embedded: false,
            source: None,
            group_id: None,
            default: false,
            mode: TrackMode::Disabled,
            cues: Vec::new(),
            backing,
        }
    }

    /// Copies the descriptive fields of an item track
    pub fn with_item_fields(mut self, item: &ItemTrack) -> Self {
        self.language = item.language.clone().filter(|l| !l.is_empty());
        self.embedded = item.embedded;
        self.source = item.source.clone();
        self.group_id = item.group_id.clone();
        self.default = item.default;
        if let TrackBacking::Sideloaded { file } = &mut self.backing {
            *file = item.file.clone();
        }
        self
    }

    pub fn is_native(&self) -> bool {
        matches!(self.backing, TrackBacking::Native { .. })
    }

    pub fn native_handle(&self) -> Option<NativeTrackHandle> {
        match self.backing {
            TrackBacking::Native { handle } => Some(handle),
            TrackBacking::Sideloaded { .. } => None,
        }
    }

    /// Returns cues active at the given time
    pub fn cues_at(&self, time_sec: TimeSec) -> Vec<&Cue> {
        self.cues.iter().filter(|c| c.is_active_at(time_sec)).collect()
    }

    /// Returns the number of cues
    pub fn len(&self) -> usize {
        self.cues.len()
    }

    /// Returns true if the track has no cues
    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }
}

// =============================================================================
// Item Tracks
// =============================================================================

/// A track declared by the media item's own track list
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ItemTrack {
    /// Explicit identifier
    pub id: Option<String>,
    pub kind: Option<TrackKind>,
    pub label: Option<String>,
    pub name: Option<String>,
    /// URL of the track file
    pub file: Option<String>,
    pub language: Option<String>,
    #[serde(alias = "defaulttrack")]
    pub default: bool,
    pub embedded: bool,
    #[serde(alias = "groupid")]
    pub group_id: Option<String>,
    pub source: Option<String>,
}

impl ItemTrack {
    pub fn new(kind: TrackKind) -> Self {
        Self {
            kind: Some(kind),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn with_file(mut self, file: &str) -> Self {
        self.file = Some(file.to_string());
        self
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.language = Some(language.to_string());
        self
    }

    pub fn with_group(mut self, group_id: &str) -> Self {
        self.group_id = Some(group_id.to_string());
        self
    }

    pub fn embedded(mut self) -> Self {
        self.embedded = true;
        self
    }
}

// =============================================================================
// Host Snapshots
// =============================================================================

/// Copy of one entry of the host's native track list, taken on notification
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeTrackSnapshot {
    pub handle: NativeTrackHandle,
    pub kind: TrackKind,
    pub label: String,
    pub language: String,
    pub mode: TrackMode,
    /// Number of cues currently on the host track
    pub cue_count: usize,
    /// Whether the host created the track from in-band data
    pub embedded: bool,
}
