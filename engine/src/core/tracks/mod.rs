//! Track Reconciliation Module
//!
//! Keeps one authoritative list of caption tracks per media item:
//! - Track identity, registration and cue deduplication
//! - Buffering of cues that arrive before their track
//! - Selection state shared by programmatic and host-driven changes
//! - Metadata cue activation
//! - Track file loading and lifecycle sequencing
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        TrackManager                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  registry.rs   - Identity, registration, cue append             │
//! │  buffer.rs     - Pending cues keyed by track id                 │
//! │  selection.rs  - Current index state machine                    │
//! │  activation.rs - Active cue -> metadata events                  │
//! │  fetch.rs      - Fetchers and in-flight load tracking           │
//! │  host.rs       - Host media surface and native bindings         │
//! │  events.rs     - Outbound event bus                             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

mod activation;
mod buffer;
mod events;
mod fetch;
mod host;
mod manager;
mod models;
mod registry;
mod selection;

pub use activation::{CueActivation, FrameTableDecoder, MetadataDecoder};
pub use buffer::CueBuffer;
pub use events::{TrackEvent, TrackEventBus, DEFAULT_EVENT_CAPACITY};
#[cfg(feature = "http-fetch")]
pub use fetch::HttpFetcher;
pub use fetch::{
    FileFetcher, LoadCompletion, LoadTracker, StaticFetcher, TrackFetcher, DEFAULT_FETCH_TIMEOUT,
};
pub use host::{HostTopic, MediaHost, MemoryHost, MemoryTrack};
pub use manager::{CaptionCueData, CueBatch, TrackManager, VttCueData};
pub use models::{
    ItemTrack, NativeTrackHandle, NativeTrackSnapshot, Track, TrackBacking, TrackKind, TrackMode,
};
pub use registry::{
    native_track_id, TrackRegistry, NATIVE_CAPTIONS_ID, NATIVE_METADATA_ID, SUBTITLE_GROUP_ID,
};
pub use selection::{SelectionState, Transition};
