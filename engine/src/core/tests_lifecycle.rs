//! Lifecycle Tests for the Track Manager
//!
//! Drives the manager end-to-end against an in-memory host and canned
//! fetch responses: installation, loading, selection, activation and
//! teardown under the orderings a player produces.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::broadcast::{self, error::TryRecvError};

use crate::core::captions::{
    Cue, CueParser, DfxpParser, FormatDispatcher, MetadataFrame, ParseError, RawCue, SrtParser, VttParser,
};
use crate::core::tracks::{
    CueBatch, HostTopic, ItemTrack, MediaHost, MemoryHost, StaticFetcher, TrackEvent, TrackFetcher, TrackKind,
    TrackManager, TrackMode, VttCueData, NATIVE_METADATA_ID,
};
use crate::core::CoreResult;

const EN_VTT: &str = "WEBVTT\n\n00:00:01.000 --> 00:00:02.000\n<b>Hello</b>\n\n00:00:03.000 --> 00:00:04.000\nWorld\n";
const FR_SRT: &str = "1\n00:00:01,000 --> 00:00:02,000\nBonjour\n";
const DE_DFXP: &str = r#"<?xml version="1.0"?><tt xmlns="http://www.w3.org/ns/ttml"><body><div>
<p begin="1s" end="2s">Hallo</p></div></body></tt>"#;

fn fetcher() -> StaticFetcher {
    StaticFetcher::new()
        .with_response("en.vtt", EN_VTT)
        .with_response("fr.srt", FR_SRT)
        .with_response("de.dfxp", DE_DFXP)
        .with_response("bad.srt", "1\nnot a timestamp\ntext\n")
        .with_failure("missing.vtt", "404 Not Found")
}

fn manager(native: bool, fetcher: StaticFetcher) -> TrackManager<MemoryHost> {
    TrackManager::new(MemoryHost::new(native), Arc::new(fetcher))
}

fn list(tracks: Vec<ItemTrack>) -> Option<Arc<[ItemTrack]>> {
    Some(Arc::from(tracks))
}

fn drain(rx: &mut broadcast::Receiver<TrackEvent>) -> Vec<TrackEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => return events,
        }
    }
}

fn selection_changes(events: &[TrackEvent]) -> Vec<usize> {
    events
        .iter()
        .filter_map(|event| match event {
            TrackEvent::SelectionChanged { current_track, .. } => Some(*current_track),
            _ => None,
        })
        .collect()
}

fn host_texts(manager: &TrackManager<MemoryHost>, label: &str) -> Vec<String> {
    manager
        .host()
        .track_by_label(label)
        .map(|track| {
            track
                .cues
                .iter()
                .filter_map(|cue| cue.payload.as_text().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn texts(manager: &TrackManager<MemoryHost>, id: &str) -> Vec<String> {
    manager
        .track(id)
        .map(|track| {
            track
                .cues
                .iter()
                .filter_map(|cue| cue.payload.as_text().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

struct CountingParser {
    inner: Box<dyn CueParser>,
    calls: Arc<AtomicUsize>,
}

impl CueParser for CountingParser {
    fn parse(&self, content: &str) -> Result<Vec<RawCue>, ParseError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.parse(content)
    }
}

fn counting(inner: Box<dyn CueParser>) -> (Box<dyn CueParser>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    (
        Box::new(CountingParser {
            inner,
            calls: calls.clone(),
        }),
        calls,
    )
}

// -----------------------------------------------------------------------------
// Installation and identity
// -----------------------------------------------------------------------------

#[test]
fn test_install_assigns_kind_prefixed_default_id() {
    let mut manager = manager(false, fetcher());
    manager.install_tracks(list(vec![
        ItemTrack::new(TrackKind::Subtitles),
        ItemTrack::new(TrackKind::Subtitles).with_id("en").with_label("English"),
    ]));

    let ids: Vec<_> = manager.tracks().into_iter().map(|t| t.id).collect();
    assert_eq!(ids, vec!["subtitles0", "en"]);
}

#[test]
fn test_install_same_list_is_a_resume() {
    let mut manager = manager(false, fetcher());
    let mut rx = manager.subscribe();
    let tracks = list(vec![ItemTrack::new(TrackKind::Subtitles).with_id("en")]);

    manager.install_tracks(tracks.clone());
    assert_eq!(drain(&mut rx).len(), 1);
    manager.install_tracks(tracks);
    assert!(drain(&mut rx).is_empty());
    assert_eq!(manager.tracks().len(), 1);
}

#[test]
fn test_install_equal_but_distinct_list_reinstalls() {
    let mut manager = manager(false, fetcher());
    let mut rx = manager.subscribe();
    let make = || list(vec![ItemTrack::new(TrackKind::Subtitles).with_id("en")]);

    manager.install_tracks(make());
    manager.install_tracks(make());
    assert_eq!(drain(&mut rx).len(), 2);
    assert_eq!(manager.tracks().len(), 1);
}

#[test]
fn test_install_none_does_nothing() {
    let mut manager = manager(false, fetcher());
    manager.install_tracks(None);
    assert!(!manager.has_session());
}

// -----------------------------------------------------------------------------
// Loading
// -----------------------------------------------------------------------------

#[tokio::test]
async fn test_webvtt_content_routes_through_vtt_parser() {
    let (vtt, vtt_calls) = counting(Box::new(VttParser));
    let (srt, srt_calls) = counting(Box::new(SrtParser));
    let (dfxp, dfxp_calls) = counting(Box::new(DfxpParser));
    let mut manager = manager(false, fetcher()).with_dispatcher(FormatDispatcher::with_parsers(dfxp, vtt, srt));

    manager.install_tracks(list(vec![ItemTrack::new(TrackKind::Subtitles)
        .with_id("en")
        .with_file("en.vtt")]));
    manager.settle_loads().await;

    assert_eq!(vtt_calls.load(Ordering::SeqCst), 1);
    assert_eq!(srt_calls.load(Ordering::SeqCst), 0);
    assert_eq!(dfxp_calls.load(Ordering::SeqCst), 0);
    assert_eq!(texts(&manager, "en"), vec!["Hello", "World"]);
}

#[tokio::test]
async fn test_every_dialect_loads() {
    let mut manager = manager(false, fetcher());
    manager.install_tracks(list(vec![
        ItemTrack::new(TrackKind::Subtitles).with_id("en").with_file("en.vtt"),
        ItemTrack::new(TrackKind::Subtitles).with_id("fr").with_file("fr.srt"),
        ItemTrack::new(TrackKind::Subtitles).with_id("de").with_file("de.dfxp"),
    ]));
    assert_eq!(manager.pending_loads(), 3);
    manager.settle_loads().await;

    assert_eq!(manager.pending_loads(), 0);
    assert_eq!(texts(&manager, "fr"), vec!["Bonjour"]);
    assert_eq!(texts(&manager, "de"), vec!["Hallo"]);
    assert_eq!(manager.track("de").unwrap().cues[0], Cue::text(1.0, 2.0, "Hallo"));
}

#[tokio::test]
async fn test_failures_are_scoped_to_their_track() {
    let mut manager = manager(false, fetcher());
    manager.install_tracks(list(vec![
        ItemTrack::new(TrackKind::Subtitles).with_id("missing").with_file("missing.vtt"),
        ItemTrack::new(TrackKind::Subtitles).with_id("bad").with_file("bad.srt"),
        ItemTrack::new(TrackKind::Subtitles).with_id("en").with_file("en.vtt"),
    ]));
    manager.settle_loads().await;

    assert_eq!(manager.tracks().len(), 3);
    assert!(manager.track("missing").unwrap().is_empty());
    assert!(manager.track("bad").unwrap().is_empty());
    assert_eq!(manager.track("en").unwrap().len(), 2);
}

#[test]
fn test_install_outside_runtime_leaves_track_empty() {
    let mut manager = manager(false, fetcher());
    manager.install_tracks(list(vec![
        ItemTrack::new(TrackKind::Subtitles).with_id("en").with_file("en.vtt"),
        ItemTrack::new(TrackKind::Subtitles).with_id("fr"),
    ]));

    assert_eq!(manager.tracks().len(), 2);
    assert!(manager.track("en").unwrap().is_empty());
    assert_eq!(manager.pending_loads(), 0);
}

struct PanickingFetcher;

#[async_trait]
impl TrackFetcher for PanickingFetcher {
    async fn fetch(&self, url: &str) -> CoreResult<String> {
        if url == "en.vtt" {
            panic!("fetcher bug");
        }
        Ok(FR_SRT.to_string())
    }
}

#[tokio::test]
async fn test_panicking_fetch_settles_as_failure() {
    let mut manager = TrackManager::new(MemoryHost::new(false), Arc::new(PanickingFetcher));
    manager.install_tracks(list(vec![
        ItemTrack::new(TrackKind::Subtitles).with_id("en").with_file("en.vtt"),
        ItemTrack::new(TrackKind::Subtitles).with_id("fr").with_file("fr.srt"),
    ]));

    tokio::time::timeout(Duration::from_secs(1), manager.settle_loads())
        .await
        .unwrap();
    assert_eq!(manager.pending_loads(), 0);
    assert!(manager.track("en").unwrap().is_empty());
    assert_eq!(texts(&manager, "fr"), vec!["Bonjour"]);
}

#[tokio::test]
async fn test_reinstall_cancels_previous_loads() {
    let slow = fetcher().with_delay(Duration::from_millis(50));
    let mut manager = manager(false, slow);
    manager.install_tracks(list(vec![ItemTrack::new(TrackKind::Subtitles)
        .with_id("en")
        .with_file("en.vtt")]));
    assert_eq!(manager.pending_loads(), 1);

    manager.install_tracks(list(vec![ItemTrack::new(TrackKind::Subtitles)
        .with_id("fr")
        .with_file("fr.srt")]));
    assert_eq!(manager.pending_loads(), 1);
    manager.settle_loads().await;

    assert!(manager.track("en").unwrap().is_empty());
    assert_eq!(texts(&manager, "fr"), vec!["Bonjour"]);
}

#[tokio::test]
async fn test_clear_discards_finished_but_unapplied_loads() {
    let mut manager = manager(false, fetcher());
    manager.install_tracks(list(vec![ItemTrack::new(TrackKind::Subtitles)
        .with_id("en")
        .with_file("en.vtt")]));
    tokio::time::sleep(Duration::from_millis(20)).await;

    manager.clear();
    assert_eq!(manager.drain_completed_loads(), 0);
    assert!(!manager.process_next_load().await);
    assert!(manager.tracks().is_empty());
}

#[tokio::test]
async fn test_drain_applies_finished_loads() {
    let mut manager = manager(false, fetcher());
    manager.install_tracks(list(vec![ItemTrack::new(TrackKind::Subtitles)
        .with_id("fr")
        .with_file("fr.srt")]));

    let mut applied = 0;
    for _ in 0..50 {
        applied += manager.drain_completed_loads();
        if applied > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(applied, 1);
    assert_eq!(texts(&manager, "fr"), vec!["Bonjour"]);
}

#[tokio::test]
async fn test_native_loads_go_to_host_track() {
    let mut manager = manager(true, fetcher());
    manager.install_tracks(list(vec![ItemTrack::new(TrackKind::Subtitles)
        .with_id("en")
        .with_label("English")
        .with_file("en.vtt")]));
    manager.on_native_change();
    manager.settle_loads().await;

    let handle = manager.track("en").unwrap().native_handle().unwrap();
    assert_eq!(host_texts(&manager, "English"), vec!["Hello", "World"]);
    assert_eq!(manager.host().track(handle).unwrap().cues.len(), 2);
    assert_eq!(manager.track("en").unwrap().len(), 2);
}

#[tokio::test]
async fn test_native_load_before_host_listing_is_flushed_once() {
    let mut manager = manager(true, fetcher());
    manager.install_tracks(list(vec![ItemTrack::new(TrackKind::Subtitles)
        .with_id("en")
        .with_label("English")
        .with_file("en.vtt")]));
    manager.settle_loads().await;

    // parsed, but the host has not listed the track yet
    assert!(manager.track("en").is_none());
    assert!(host_texts(&manager, "English").is_empty());

    manager.on_native_change();
    assert_eq!(texts(&manager, "en"), vec!["Hello", "World"]);
    assert_eq!(host_texts(&manager, "English"), vec!["Hello", "World"]);

    let snapshots = manager.host().text_tracks();
    manager.set_text_tracks(&snapshots);
    manager.on_native_change();
    assert_eq!(host_texts(&manager, "English"), vec!["Hello", "World"]);
    assert_eq!(manager.track("en").unwrap().len(), 2);
}

// -----------------------------------------------------------------------------
// Native reseeding
// -----------------------------------------------------------------------------

#[test]
fn test_native_reinstall_keeps_embedded_and_grouped_tracks() {
    let mut manager = manager(true, fetcher());
    manager.install_tracks(list(vec![
        ItemTrack::new(TrackKind::Subtitles).with_id("side").with_label("Side"),
        ItemTrack::new(TrackKind::Captions).with_id("cc").with_label("CC").embedded(),
        ItemTrack::new(TrackKind::Subtitles)
            .with_id("hls-en")
            .with_label("HLS English")
            .with_group("subs"),
    ]));
    manager.on_native_change();
    manager.select_by_menu_index(2);

    manager.install_tracks(list(vec![ItemTrack::new(TrackKind::Subtitles)
        .with_id("next")
        .with_label("Next")]));
    manager.on_native_change();

    let ids: Vec<_> = manager.tracks().into_iter().map(|t| t.id).collect();
    assert_eq!(ids, vec!["cc", "hls-en", "next"]);
    assert_eq!(manager.current_index(), None);
    let cc = manager.track("cc").unwrap().native_handle().unwrap();
    assert_eq!(manager.host().track(cc).unwrap().mode, TrackMode::Disabled);
}

// -----------------------------------------------------------------------------
// Selection
// -----------------------------------------------------------------------------

#[test]
fn test_select_off_disables_active_track() {
    let mut manager = manager(true, fetcher());
    manager.install_tracks(list(vec![
        ItemTrack::new(TrackKind::Subtitles).with_id("en").with_label("English"),
        ItemTrack::new(TrackKind::Subtitles).with_id("fr").with_label("French"),
    ]));
    manager.on_native_change();
    manager.select_by_menu_index(1);
    let en = manager.track("en").unwrap().native_handle().unwrap();
    assert_eq!(manager.host().track(en).unwrap().mode, TrackMode::Showing);

    manager.select_by_menu_index(0);
    assert_eq!(manager.current_index(), None);
    assert_eq!(manager.host().track(en).unwrap().mode, TrackMode::Disabled);
    assert_eq!(manager.track("en").unwrap().mode, TrackMode::Disabled);
}

#[test]
fn test_repeated_selection_emits_once() {
    let mut manager = manager(true, fetcher());
    let mut rx = manager.subscribe();
    manager.install_tracks(list(vec![ItemTrack::new(TrackKind::Subtitles)
        .with_id("en")
        .with_label("English")]));
    manager.on_native_change();

    manager.select_by_menu_index(1);
    manager.select_by_menu_index(1);
    assert_eq!(selection_changes(&drain(&mut rx)), vec![1]);
}

#[test]
fn test_host_mode_changes_follow_state_machine() {
    let mut manager = manager(true, fetcher());
    let mut rx = manager.subscribe();
    manager.install_tracks(list(vec![
        ItemTrack::new(TrackKind::Subtitles).with_id("en").with_label("English"),
        ItemTrack::new(TrackKind::Subtitles).with_id("fr").with_label("French"),
    ]));
    manager.on_native_change();
    let en = manager.track("en").unwrap().native_handle().unwrap();
    let fr = manager.track("fr").unwrap().native_handle().unwrap();

    manager.select_by_menu_index(1);
    // platform picker switches to French
    manager.host_mut().set_mode_externally(en, TrackMode::Disabled);
    manager.host_mut().set_mode_externally(fr, TrackMode::Showing);
    manager.on_native_change();
    assert_eq!(manager.current_track().unwrap().id, "fr");

    // platform picker turns captions off
    manager.host_mut().set_mode_externally(fr, TrackMode::Disabled);
    manager.on_native_change();
    assert_eq!(manager.current_index(), None);

    assert_eq!(selection_changes(&drain(&mut rx)), vec![1, 2, 0]);
}

#[test]
fn test_host_list_growth_triggers_resync() {
    let mut manager = manager(true, fetcher());
    let mut rx = manager.subscribe();
    manager.install_tracks(list(vec![ItemTrack::new(TrackKind::Subtitles)
        .with_id("en")
        .with_label("English")]));

    let cc = manager.host_mut().push_embedded_track(TrackKind::Captions, "CC1");
    manager.host_mut().push_cue(cc, Cue::text(0.0, 1.0, "in-band"));
    manager.host_mut().set_mode_externally(cc, TrackMode::Showing);
    manager.on_native_change();

    let ids: Vec<_> = manager.tracks().into_iter().map(|t| t.id).collect();
    assert_eq!(ids, vec!["en", "native-captions"]);
    assert_eq!(manager.current_index(), Some(1));

    let events = drain(&mut rx);
    assert!(events.iter().any(|e| e.name() == "subtitlesTracks"));
    assert_eq!(selection_changes(&events), vec![2]);
}

// -----------------------------------------------------------------------------
// Metadata activation
// -----------------------------------------------------------------------------

#[test]
fn test_metadata_activation_emits_text_and_batched_binary_events() {
    let mut manager = manager(false, fetcher());
    let text = Cue::text(5.0, 6.0, r#"{"chapter": 2}"#);
    let binary = Cue::metadata(5.0, 6.0, MetadataFrame::text("TXXX", "ad"));
    for cue in [text, binary] {
        manager
            .add_vtt_cue(VttCueData {
                kind: TrackKind::Metadata,
                cue,
            })
            .unwrap();
    }

    let handle = manager.track(NATIVE_METADATA_ID).unwrap().native_handle().unwrap();
    assert!(manager.host().is_subscribed(HostTopic::ActiveCuesChanged(handle)));
    let active = manager.host().active_cues(handle, 5.5);
    assert_eq!(active.len(), 2);

    let mut rx = manager.subscribe();

    manager.on_active_cues_changed(&active);
    manager.on_active_cues_changed(&active);

    let events = drain(&mut rx);
    assert_eq!(
        events,
        vec![
            TrackEvent::Metadata {
                time: 5.0,
                payload: json!({"chapter": 2})
            },
            TrackEvent::Metadata {
                time: 5.0,
                payload: json!({"TXXX": "ad"})
            },
        ]
    );
}

#[test]
fn test_activation_without_session_is_ignored() {
    let mut manager = manager(false, fetcher());
    let mut rx = manager.subscribe();
    manager.on_active_cues_changed(&[Cue::text(1.0, 2.0, "{}")]);
    assert!(drain(&mut rx).is_empty());
}

// -----------------------------------------------------------------------------
// Cue ordering
// -----------------------------------------------------------------------------

#[test]
fn test_batches_keep_track_sorted() {
    let mut manager = manager(false, fetcher());
    manager.install_tracks(list(vec![ItemTrack::new(TrackKind::Subtitles).with_id("en")]));

    let batch = |cues: &[(f64, f64)]| CueBatch {
        name: "en".to_string(),
        source: None,
        captions: cues
            .iter()
            .map(|(begin, end)| RawCue::new(*begin, *end, "x"))
            .collect(),
    };
    manager.add_cues_to_track(batch(&[(10.0, 11.0), (20.0, 21.0)]));
    manager.add_cues_to_track(batch(&[(1.0, 2.0), (15.0, 16.0)]));
    manager.add_cues_to_track(batch(&[(30.0, 31.0), (5.0, 6.0)]));

    let starts: Vec<_> = manager
        .track("en")
        .unwrap()
        .cues
        .iter()
        .map(|cue| cue.start_time)
        .collect();
    assert_eq!(starts, vec![1.0, 5.0, 10.0, 15.0, 20.0, 30.0]);
}

// -----------------------------------------------------------------------------
// Teardown
// -----------------------------------------------------------------------------

#[test]
fn test_clear_resets_session_state() {
    let mut manager = manager(true, fetcher());
    manager.install_tracks(list(vec![ItemTrack::new(TrackKind::Subtitles)
        .with_id("en")
        .with_label("English")]));
    manager.on_native_change();
    manager.select_by_menu_index(1);

    manager.clear();
    assert!(!manager.has_session());
    assert!(manager.tracks().is_empty());
    assert_eq!(manager.menu_index(), 0);
    for track in manager.host().tracks() {
        assert_eq!(track.mode, TrackMode::Disabled);
        assert!(track.cues.is_empty());
    }

    // the same list object after clear counts as new
    let tracks = list(vec![ItemTrack::new(TrackKind::Subtitles)
        .with_id("en")
        .with_label("English")]);
    manager.install_tracks(tracks);
    manager.on_native_change();
    assert_eq!(manager.tracks().len(), 1);
    assert_eq!(manager.host().text_tracks().len(), 1);
}
