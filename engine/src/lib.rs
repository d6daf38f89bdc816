//! Captrack Core Library
//!
//! Caption and subtitle track reconciliation for media playback.
//! Reconciles the tracks a media item declares with the tracks a host
//! renders natively, normalizes cues from SRT, WebVTT, DFXP and binary
//! metadata into one representation, and keeps a single track selection in
//! sync with host-driven changes.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use captrack::{FileFetcher, ItemTrack, MemoryHost, TrackKind, TrackManager};
//!
//! let mut manager = TrackManager::new(MemoryHost::new(false), Arc::new(FileFetcher::new()));
//! let mut events = manager.subscribe();
//! manager.install_tracks(Some(Arc::from(vec![
//!     ItemTrack::new(TrackKind::Subtitles).with_label("English").with_file("subs/en.vtt"),
//! ])));
//! manager.settle_loads().await;
//! manager.select_by_menu_index(1);
//! ```

pub mod core;

pub use crate::core::captions::{Cue, CuePayload, MetadataFrame, RawCue};
pub use crate::core::settings::CaptionSettings;
pub use crate::core::tracks::{
    FileFetcher, ItemTrack, MediaHost, MemoryHost, Track, TrackEvent, TrackFetcher, TrackKind,
    TrackManager, TrackMode,
};
pub use crate::core::{CoreError, CoreResult};

/// Installs a global `tracing` subscriber writing to stdout.
///
/// The filter is read from `RUST_LOG`, defaulting to `info`. Calling this
/// when a subscriber is already installed does nothing.
pub fn init_logging() {
    use tracing_subscriber::prelude::*;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(cfg!(debug_assertions));

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    // Avoid panics if already initialized (tests, embedding hosts).
    let _ = tracing::subscriber::set_global_default(subscriber);
}
