//! Track Manager
//!
//! Lifecycle controller of the caption engine. Sequences the registry, cue
//! buffer, selection state and activation handler for one media item at a
//! time, reconciles item-declared tracks with the host's native track list,
//! and owns the in-flight track loads.
//!
//! All state changes happen on the owner's thread through the entry points
//! below. Fetches run on spawned tasks; their results are applied by
//! [`TrackManager::process_next_load`] or
//! [`TrackManager::drain_completed_loads`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

use super::activation::{CueActivation, FrameTableDecoder, MetadataDecoder};
use super::buffer::CueBuffer;
use super::events::{TrackEvent, TrackEventBus};
use super::fetch::{LoadCompletion, LoadTracker, TrackFetcher};
use super::host::{HostTopic, MediaHost, NativeBindings};
use super::models::{ItemTrack, NativeTrackHandle, NativeTrackSnapshot, Track, TrackKind, TrackMode};
use super::registry::{native_track_id, TrackRegistry};
use super::selection::{SelectionState, Transition};
use crate::core::captions::{convert_cue, convert_cues, Cue, FormatDispatcher, RawCue};
use crate::core::settings::CaptionSettings;
use crate::core::types::first_non_empty;
use crate::core::{CoreError, CoreResult, TimeSec, TrackId};

// =============================================================================
// Inbound Cue Data
// =============================================================================

/// One caption cue decoded from an embedded caption stream (e.g. CEA-608)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionCueData {
    #[serde(alias = "trackid")]
    pub track_id: String,
    pub begin: TimeSec,
    pub end: TimeSec,
    pub text: String,
    /// Cue is timed by decode timestamps
    #[serde(default, alias = "useDTS")]
    pub use_dts: bool,
    #[serde(default)]
    pub source: Option<String>,
}

/// A ready-made cue for the native captions or metadata track
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VttCueData {
    #[serde(rename = "type")]
    pub kind: TrackKind,
    pub cue: Cue,
}

/// A batch of cue tuples for a registered track
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CueBatch {
    /// Id of the destination track
    pub name: TrackId,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub captions: Vec<RawCue>,
}

// =============================================================================
// Session
// =============================================================================

/// State of one media item, created on install and dropped on clear
#[derive(Debug, Default)]
struct TrackSession {
    registry: TrackRegistry,
    buffer: CueBuffer,
    selection: SelectionState,
    activation: CueActivation,
    unknown_labels: usize,
    /// Keys of incrementally added cues
    cue_keys: HashSet<String>,
    /// Native item tracks created on the host but not yet listed by it
    awaiting_host: HashMap<TrackId, Track>,
    metadata_handle: Option<NativeTrackHandle>,
}

impl TrackSession {
    /// Keeps only embedded and grouped tracks and forgets everything
    /// derived from the rest. Returns the host tracks no longer in use.
    fn reseed(&mut self) -> Vec<NativeTrackHandle> {
        let previous: Vec<NativeTrackHandle> = self
            .registry
            .listed()
            .chain(self.awaiting_host.values())
            .filter_map(Track::native_handle)
            .collect();
        self.registry.rebuild_as_non_native();
        self.buffer.clear();
        self.selection.reset();
        self.unknown_labels = 0;
        self.cue_keys.clear();
        self.awaiting_host.clear();

        previous
            .into_iter()
            .filter(|handle| !self.registry.listed().any(|t| t.native_handle() == Some(*handle)))
            .collect()
    }

    /// Holds a native track until the host lists it. Returns false if the
    /// id is already taken.
    fn await_host(&mut self, track: Track) -> bool {
        if self.registry.contains(&track.id) || self.awaiting_host.contains_key(&track.id) {
            debug!(target: "captions", track_id = %track.id, "Ignoring duplicate track");
            return false;
        }
        self.awaiting_host.insert(track.id.clone(), track);
        true
    }

    fn create_label(&mut self, item: &ItemTrack, unknown_label: &str) -> String {
        if let Some(label) = first_non_empty([
            item.label.as_deref(),
            item.name.as_deref(),
            item.language.as_deref(),
        ]) {
            return label.to_string();
        }
        self.unknown_labels += 1;
        if self.unknown_labels > 1 {
            format!("{} [{}]", unknown_label, self.unknown_labels)
        } else {
            unknown_label.to_string()
        }
    }
}

// =============================================================================
// Track Manager
// =============================================================================

/// Caption track lifecycle controller for one host surface
pub struct TrackManager<H: MediaHost> {
    host: H,
    settings: CaptionSettings,
    dispatcher: FormatDispatcher,
    decoder: Box<dyn MetadataDecoder>,
    loads: LoadTracker,
    events: TrackEventBus,
    bindings: NativeBindings,
    session: Option<TrackSession>,
    item_tracks: Option<Arc<[ItemTrack]>>,
    generation: u64,
    render_natively: bool,
    change_listener: bool,
}

impl<H: MediaHost> std::fmt::Debug for TrackManager<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackManager")
            .field("session", &self.session)
            .field("loads", &self.loads)
            .field("generation", &self.generation)
            .field("render_natively", &self.render_natively)
            .finish_non_exhaustive()
    }
}

impl<H: MediaHost> TrackManager<H> {
    pub fn new(host: H, fetcher: Arc<dyn TrackFetcher>) -> Self {
        Self::with_settings(host, fetcher, CaptionSettings::default())
    }

    pub fn with_settings(host: H, fetcher: Arc<dyn TrackFetcher>, mut settings: CaptionSettings) -> Self {
        settings.normalize();
        Self {
            host,
            dispatcher: FormatDispatcher::default(),
            decoder: Box::new(FrameTableDecoder),
            loads: LoadTracker::new(fetcher, settings.fetch_timeout()),
            events: TrackEventBus::new(settings.event_capacity),
            bindings: NativeBindings::default(),
            session: None,
            item_tracks: None,
            generation: 0,
            render_natively: false,
            change_listener: false,
            settings,
        }
    }

    /// Replaces the binary metadata decoder
    pub fn with_decoder(mut self, decoder: Box<dyn MetadataDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    /// Replaces the format dispatcher
    pub fn with_dispatcher(mut self, dispatcher: FormatDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn subscribe(&self) -> broadcast::Receiver<TrackEvent> {
        self.events.subscribe()
    }

    pub fn events(&self) -> &TrackEventBus {
        &self.events
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn settings(&self) -> &CaptionSettings {
        &self.settings
    }

    pub fn renders_natively(&self) -> bool {
        self.render_natively
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Selectable tracks in menu order
    pub fn tracks(&self) -> Vec<Track> {
        self.session
            .as_ref()
            .map(|session| session.registry.snapshot())
            .unwrap_or_default()
    }

    /// Resolves any track of the session, listed or not
    pub fn track(&self, id: &str) -> Option<&Track> {
        self.session.as_ref()?.registry.resolve(id)
    }

    /// Internal index of the selected track, `None` when off
    pub fn current_index(&self) -> Option<usize> {
        self.session.as_ref()?.selection.current_index()
    }

    /// 1-based menu index of the selected track, `0` when off
    pub fn menu_index(&self) -> usize {
        self.session
            .as_ref()
            .map_or(0, |session| session.selection.menu_index())
    }

    pub fn current_track(&self) -> Option<&Track> {
        let session = self.session.as_ref()?;
        session.registry.track_at(session.selection.current_index()?)
    }

    /// Number of track loads still in flight
    pub fn pending_loads(&self) -> usize {
        self.loads.pending()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Installs the track list of a new media item.
    ///
    /// Installing the same list again (by identity) is a resume and changes
    /// nothing. Otherwise loads of the previous list are cancelled and, when
    /// rendering natively, the registry is reseeded before the tracks are
    /// added.
    pub fn install_tracks(&mut self, item_tracks: Option<Arc<[ItemTrack]>>) {
        let already_loaded = match (&self.item_tracks, &item_tracks) {
            (Some(previous), Some(next)) => Arc::ptr_eq(previous, next),
            (None, None) => true,
            _ => false,
        };

        if !already_loaded {
            let cancelled = self.loads.cancel_generation(self.generation);
            if cancelled > 0 {
                debug!(target: "captions", cancelled, "Cancelled loads of previous item");
            }
            self.generation += 1;
        }
        self.item_tracks = item_tracks.clone();

        let Some(tracks) = item_tracks else {
            return;
        };
        if already_loaded {
            debug!(target: "captions", "Item tracks already installed");
            return;
        }

        self.render_natively = self.host.native_rendering_supported();
        if self.render_natively {
            self.disable_text_track();
            if let Some(session) = self.session.as_mut() {
                for handle in session.reseed() {
                    self.bindings.retire(handle);
                }
            }
        }

        info!(
            target: "captions",
            count = tracks.len(),
            native = self.render_natively,
            "Installing item tracks"
        );
        self.add_tracks(&tracks);
    }

    /// Adds item-declared tracks, starting a load for each file-backed one.
    ///
    /// Tracks of kinds other than subtitles or captions are skipped, and
    /// tracks whose id is already taken are ignored. When rendering without
    /// the host, the track list is announced immediately. Native tracks are
    /// only registered once the host lists them in [`Self::set_text_tracks`].
    pub fn add_tracks(&mut self, tracks: &[ItemTrack]) {
        self.session.get_or_insert_with(TrackSession::default);
        self.render_natively = self.host.native_rendering_supported();

        for item in tracks {
            if let Some(kind) = item.kind.filter(|kind| !kind.is_selectable()) {
                debug!(target: "captions", %kind, "Skipping unsupported track kind");
                continue;
            }

            let track = self.create_track(item);
            let id = track.id.clone();
            let Some(session) = self.session.as_mut() else {
                return;
            };
            let added = if track.is_native() {
                session.await_host(track)
            } else {
                session.registry.register(track)
            };
            if !added {
                continue;
            }

            if let Some(file) = item.file.as_deref().filter(|file| !file.is_empty()) {
                if let Err(e) = self.loads.start(self.generation, &id, file) {
                    warn!(target: "captions", track_id = %id, url = file, error = %e, "Failed to start track load");
                }
            }
        }

        if !self.render_natively {
            self.announce_tracks();
        }
    }

    /// Reconciles the host's native track list with the registry.
    ///
    /// Metadata tracks are kept hidden and their active cues observed.
    /// Empty embedded tracks are deferred until they have cues. Cues parsed
    /// before a track appeared are flushed onto it.
    pub fn set_text_tracks(&mut self, snapshots: &[NativeTrackSnapshot]) {
        let session = self.session.get_or_insert_with(TrackSession::default);
        session.selection.reset();

        for snapshot in snapshots {
            let handle = snapshot.handle;
            let id = match self.bindings.get(handle) {
                Some(binding) if !binding.in_use => continue,
                Some(binding) => binding.id.clone(),
                None => {
                    let id = session.registry.assign_native_identity(snapshot);
                    self.bindings.bind(handle, &id);
                    id
                }
            };
            if session.registry.contains(&id) {
                continue;
            }

            match snapshot.kind {
                TrackKind::Metadata => {
                    self.host.set_track_mode(handle, TrackMode::Hidden);
                    self.host.subscribe(HostTopic::ActiveCuesChanged(handle));

                    let label = if snapshot.label.is_empty() {
                        self.settings.metadata_label.as_str()
                    } else {
                        snapshot.label.as_str()
                    };
                    let mut track = Track::native(&id, TrackKind::Metadata, label, handle);
                    track.mode = TrackMode::Hidden;
                    track.embedded = snapshot.embedded;
                    session.registry.register_unlisted(track);
                    session.metadata_handle = Some(handle);
                }
                kind if kind.is_selectable() => {
                    if snapshot.embedded && snapshot.cue_count == 0 {
                        trace!(target: "captions", track_id = %id, "Deferring empty embedded track");
                        continue;
                    }

                    let mut track = session.awaiting_host.remove(&id).unwrap_or_else(|| {
                        let mut track = Track::native(&id, kind, &snapshot.label, handle);
                        track.embedded = snapshot.embedded;
                        track.language = Some(snapshot.language.clone()).filter(|l| !l.is_empty());
                        track
                    });
                    track.mode = snapshot.mode;
                    session.registry.register(track);

                    for cue in session.buffer.flush_if_pending(&id, &mut session.registry) {
                        self.host.add_cue(handle, &cue);
                    }
                }
                _ => {}
            }
        }

        if self.render_natively {
            if self.change_listener {
                self.host.unsubscribe(HostTopic::TrackListChanged);
            }
            self.host.subscribe(HostTopic::TrackListChanged);
            self.change_listener = true;
        }

        self.announce_tracks();
    }

    /// Tears down the session.
    ///
    /// Cancels every load and, if host tracks were used, empties and retires
    /// each host track (hidden first, since cues cannot reliably be removed
    /// from a showing track).
    pub fn clear(&mut self) {
        let cancelled = self.loads.cancel_all();
        let metadata = self.session.as_ref().and_then(|session| session.metadata_handle);

        if self.render_natively || metadata.is_some() {
            for snapshot in self.host.text_tracks() {
                self.host.set_track_mode(snapshot.handle, TrackMode::Hidden);
                self.host.remove_cues(snapshot.handle);
                self.host.set_track_mode(snapshot.handle, TrackMode::Disabled);
                self.bindings.retire(snapshot.handle);
            }
        }
        if let Some(handle) = metadata {
            self.host.unsubscribe(HostTopic::ActiveCuesChanged(handle));
        }

        self.session = None;
        self.item_tracks = None;
        info!(target: "captions", cancelled, "Cleared caption tracks");
    }

    // =========================================================================
    // Selection
    // =========================================================================

    /// Selects a track by 1-based menu index, `0` meaning off
    pub fn select_by_menu_index(&mut self, menu_index: usize) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let transition =
            session
                .selection
                .select_by_menu_index(menu_index, &mut session.registry, self.render_natively);
        self.apply_transition(transition);
    }

    /// Disables the selected track without changing the selection
    pub fn disable_text_track(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if let Some(change) = session.selection.disable_current(&mut session.registry) {
            self.apply_transition(Transition {
                modes: vec![change],
                announce: None,
            });
        }
    }

    /// Handles a change of the host's native track list or track modes.
    ///
    /// Resyncs when the host lists more admissible tracks than are
    /// registered, then routes the first showing track into the selection.
    pub fn on_native_change(&mut self) {
        let snapshots = self.host.text_tracks();
        let admissible = snapshots
            .iter()
            .filter(|snapshot| self.bindings.admissible(snapshot))
            .count();
        let registered = self.session.as_ref().map(|session| session.registry.len());
        if registered.map_or(true, |count| admissible > count) {
            debug!(target: "captions", admissible, "Native track list grew, resyncing");
            self.set_text_tracks(&snapshots);
        }

        let Some(session) = self.session.as_mut() else {
            return;
        };
        for snapshot in &snapshots {
            let Some(binding) = self.bindings.get(snapshot.handle) else {
                continue;
            };
            if let Some(track) = session.registry.resolve_mut(&binding.id) {
                if track.native_handle() == Some(snapshot.handle) {
                    track.mode = snapshot.mode;
                }
            }
        }

        let transition = session
            .selection
            .sync_from_modes(&mut session.registry, self.render_natively);
        self.apply_transition(transition);
    }

    /// Handles an "active cues changed" notification of the metadata track
    pub fn on_active_cues_changed(&mut self, active: &[Cue]) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        for event in session.activation.on_active_cues(active, self.decoder.as_ref()) {
            self.events.publish(event);
        }
    }

    fn apply_transition(&mut self, transition: Transition) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        for (id, mode) in &transition.modes {
            if let Some(handle) = session.registry.resolve(id).and_then(Track::native_handle) {
                self.host.set_track_mode(handle, *mode);
            }
        }
        if let Some(current_track) = transition.announce {
            self.events.publish(TrackEvent::SelectionChanged {
                current_track,
                tracks: session.registry.snapshot(),
            });
        }
    }

    // =========================================================================
    // Incremental Cues
    // =========================================================================

    /// Adds one caption cue from an embedded caption stream, creating its
    /// captions track on first use
    pub fn add_captions_cue(&mut self, data: CaptionCueData) {
        let raw = RawCue::new(data.begin, data.end, &data.text);
        let Some(cue) = convert_cue(&raw) else {
            trace!(target: "captions", track_id = %data.track_id, "Dropping invalid caption cue");
            return;
        };
        let track_id = data.track_id;

        let known = self
            .session
            .as_ref()
            .is_some_and(|session| session.registry.contains(&track_id));
        if !known {
            let item = ItemTrack::new(TrackKind::Captions).with_id(&track_id);
            self.add_tracks(std::slice::from_ref(&item));
            if self.render_natively {
                let snapshots = self.host.text_tracks();
                self.set_text_tracks(&snapshots);
            }
        }

        let default_source = &self.settings.default_caption_source;
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if data.use_dts {
            if let Some(track) = session.registry.resolve_mut(&track_id) {
                if track.source.is_none() {
                    track.source = Some(data.source.unwrap_or_else(|| default_source.clone()));
                }
            }
        }

        let key = format!("caption:{}_{}_{}", track_id, cue.start_time, data.text);
        if session.cue_keys.insert(key) {
            self.deliver_cues(&track_id, vec![cue]);
        }
    }

    /// Adds a cue to the native captions or metadata track, creating the
    /// track on first use
    pub fn add_vtt_cue(&mut self, data: VttCueData) -> CoreResult<()> {
        let Some(track_id) = native_track_id(data.kind) else {
            return Err(CoreError::UnsupportedKind(data.kind.to_string()));
        };
        if let Err(e) = check_cue(&data.cue) {
            trace!(target: "captions", track_id, error = %e, "Dropping invalid cue");
            return Ok(());
        }

        let existing = self
            .session
            .as_ref()
            .and_then(|session| session.registry.resolve(track_id));
        let mut handle = existing.and_then(Track::native_handle);

        if existing.is_none() {
            let label = match data.kind {
                TrackKind::Captions => self.settings.unknown_label.clone(),
                _ => self.settings.metadata_label.clone(),
            };
            let item = ItemTrack::new(data.kind)
                .with_id(track_id)
                .with_label(&label)
                .embedded();

            if self.render_natively || data.kind == TrackKind::Metadata {
                self.session.get_or_insert_with(TrackSession::default);
                let (_, created) = self.materialize_native(&item, data.kind, &label);
                handle = Some(created);
                let snapshots = self.host.text_tracks();
                self.set_text_tracks(&snapshots);
            } else {
                self.add_tracks(std::slice::from_ref(&item));
            }
        }

        let registered = self
            .session
            .as_ref()
            .is_some_and(|session| session.registry.contains(track_id));
        if registered {
            self.deliver_cues(track_id, vec![data.cue]);
        } else if let Some(handle) = handle {
            self.host.add_cue(handle, &data.cue);
        }
        Ok(())
    }

    /// Appends a batch of cue tuples to a registered track, skipping tuples
    /// already added for the same start and end
    pub fn add_cues_to_track(&mut self, batch: CueBatch) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(track) = session.registry.resolve_mut(&batch.name) else {
            debug!(target: "captions", track_id = %batch.name, "Ignoring cues for unknown track");
            return;
        };
        track.source = batch.source;

        let name = batch.name;
        let cues: Vec<Cue> = convert_cues(batch.captions)
            .into_iter()
            .filter(|cue| {
                session
                    .cue_keys
                    .insert(format!("batch:{}_{}_{}", name, cue.start_time, cue.end_time))
            })
            .collect();
        self.deliver_cues(&name, cues);
    }

    // =========================================================================
    // Track Loads
    // =========================================================================

    /// Waits for the next track load to finish and applies it.
    ///
    /// Returns false once no loads are in flight.
    pub async fn process_next_load(&mut self) -> bool {
        match self.loads.next_completion().await {
            Some(completion) => {
                self.apply_load(completion);
                true
            }
            None => false,
        }
    }

    /// Applies every in-flight load as it finishes
    pub async fn settle_loads(&mut self) {
        while self.process_next_load().await {}
    }

    /// Applies loads that already finished, without waiting
    pub fn drain_completed_loads(&mut self) -> usize {
        let mut applied = 0;
        while let Some(completion) = self.loads.try_next_completion() {
            self.apply_load(completion);
            applied += 1;
        }
        applied
    }

    fn apply_load(&mut self, completion: LoadCompletion) {
        let track_id = completion.track_id;
        let url = completion.url;

        let content = match completion.result {
            Ok(content) => content,
            Err(e) => {
                warn!(target: "captions", track_id = %track_id, url = %url, error = %e, "Failed to load track");
                return;
            }
        };
        let ingested = match self.dispatcher.ingest(&content) {
            Ok(ingested) => ingested,
            Err(e) => {
                warn!(target: "captions", track_id = %track_id, url = %url, error = %e, "Failed to parse track");
                return;
            }
        };

        debug!(
            target: "captions",
            track_id = %track_id,
            dialect = ?ingested.dialect,
            cues = ingested.cues.len(),
            "Loaded track"
        );
        self.place_loaded_cues(&track_id, ingested.cues);
    }

    /// Puts loaded cues on their track, or stages them until it appears.
    ///
    /// Under native rendering a track only ever receives one loaded batch.
    fn place_loaded_cues(&mut self, track_id: &str, cues: Vec<Cue>) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !session.registry.contains(track_id) {
            session.buffer.stage(track_id, cues);
            return;
        }
        if self.render_natively {
            if session.buffer.is_flushed(track_id) {
                debug!(target: "captions", track_id, "Track cues already delivered");
                return;
            }
            session.buffer.mark_flushed(track_id);
        }
        self.deliver_cues(track_id, cues);
    }

    /// Appends cues to a registered track and mirrors the accepted ones onto
    /// its host track
    fn deliver_cues(&mut self, track_id: &str, cues: Vec<Cue>) -> usize {
        let Some(session) = self.session.as_mut() else {
            return 0;
        };
        let accepted = match session.registry.append_cues(track_id, cues) {
            Ok(accepted) => accepted,
            Err(e) => {
                debug!(target: "captions", error = %e, "Dropping cues");
                return 0;
            }
        };
        if let Some(handle) = session.registry.resolve(track_id).and_then(Track::native_handle) {
            for cue in &accepted {
                self.host.add_cue(handle, cue);
            }
        }
        accepted.len()
    }

    // =========================================================================
    // Track Creation
    // =========================================================================

    fn create_track(&mut self, item: &ItemTrack) -> Track {
        let kind = item.kind.unwrap_or(TrackKind::Captions);
        let session = self.session.get_or_insert_with(TrackSession::default);
        let label = session.create_label(item, &self.settings.unknown_label);

        if self.render_natively || kind == TrackKind::Metadata {
            let (id, handle) = self.materialize_native(item, kind, &label);
            Track::native(&id, kind, &label, handle).with_item_fields(item)
        } else {
            let id = session.registry.assign_identity(item);
            Track::sideloaded(&id, kind, &label).with_item_fields(item)
        }
    }

    /// Finds the host track with the given label, or creates one, and binds
    /// it to the item's id. Host labels are read-only, so the label is the
    /// only way to recognise a track created earlier.
    fn materialize_native(&mut self, item: &ItemTrack, kind: TrackKind, label: &str) -> (TrackId, NativeTrackHandle) {
        let existing = self
            .host
            .text_tracks()
            .into_iter()
            .find(|snapshot| snapshot.label == label)
            .map(|snapshot| snapshot.handle);
        let handle = match existing {
            Some(handle) => handle,
            None => self
                .host
                .add_text_track(kind, label, item.language.as_deref().unwrap_or_default()),
        };

        let id = match first_non_empty([item.id.as_deref()]) {
            Some(id) => id.to_string(),
            None => match self.bindings.get(handle) {
                Some(binding) => binding.id.clone(),
                None => self
                    .session
                    .get_or_insert_with(TrackSession::default)
                    .registry
                    .assign_identity(item),
            },
        };

        self.bindings.bind(handle, &id);
        self.host.set_track_mode(handle, TrackMode::Disabled);
        (id, handle)
    }

    fn announce_tracks(&self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        if !session.registry.is_empty() {
            self.events.publish(TrackEvent::TracksAvailable {
                tracks: session.registry.snapshot(),
            });
        }
    }
}

/// Validates a ready-made cue the way parsed tuples are validated
fn check_cue(cue: &Cue) -> CoreResult<()> {
    if !cue.has_valid_timing() {
        return Err(CoreError::InvalidCue(format!(
            "bad interval {}..{}",
            cue.start_time, cue.end_time
        )));
    }
    if cue.payload.as_text().is_some_and(str::is_empty) {
        return Err(CoreError::InvalidCue("empty text".to_string()));
    }
    Ok(())
}
