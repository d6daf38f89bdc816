//! Selection State Machine
//!
//! Owns the single current track index. Programmatic selection and
//! runtime-driven mode changes both converge on
//! [`SelectionState::select_by_menu_index`].
//!
//! Menu indices are 1-based with `0` meaning "Off"; internal indices are
//! positions in the registry's listed order.

use tracing::{debug, warn};

use super::models::TrackMode;
use super::registry::TrackRegistry;
use crate::core::TrackId;

/// Mode changes produced by one selection transition
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Transition {
    /// Tracks whose mode changed, in application order
    pub modes: Vec<(TrackId, TrackMode)>,
    /// Menu index to announce, set only when rendering natively
    pub announce: Option<usize>,
}

impl Transition {
    pub fn is_empty(&self) -> bool {
        self.modes.is_empty() && self.announce.is_none()
    }
}

/// Current selection: `None` is "Off"
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SelectionState {
    current: Option<usize>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the internal index of the selected track
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    /// Returns the 1-based menu index, `0` when off
    pub fn menu_index(&self) -> usize {
        self.current.map_or(0, |index| index + 1)
    }

    /// Forgets the selection without touching track modes
    pub fn reset(&mut self) {
        self.current = None;
    }

    /// Selects a track by menu index.
    ///
    /// Selecting Off disables every listed track. Selecting the current
    /// index again changes nothing else and announces nothing. Indices past
    /// the end of the list are ignored.
    pub fn select_by_menu_index(
        &mut self,
        menu_index: usize,
        registry: &mut TrackRegistry,
        render_natively: bool,
    ) -> Transition {
        let mut transition = Transition::default();

        if menu_index == 0 {
            let ids: Vec<TrackId> = registry.listed().map(|t| t.id.clone()).collect();
            for id in ids {
                set_mode(registry, &id, TrackMode::Disabled, &mut transition);
            }
        }

        let target = menu_index.checked_sub(1);
        if target == self.current {
            return transition;
        }
        if target.is_some_and(|index| index >= registry.len()) {
            warn!(target: "captions", menu_index, tracks = registry.len(), "Ignoring out-of-range track selection");
            return transition;
        }

        if let Some(disabled) = self.disable_current(registry) {
            push_change(&mut transition, disabled);
        }
        self.current = target;
        debug!(target: "captions", menu_index, "Selected caption track");

        if render_natively {
            if let Some(id) = target.and_then(|index| registry.track_at(index)).map(|t| t.id.clone()) {
                set_mode(registry, &id, TrackMode::Showing, &mut transition);
            }
            transition.announce = Some(menu_index);
        }

        transition
    }

    /// Disables the selected track, keeping the index
    pub fn disable_current(&self, registry: &mut TrackRegistry) -> Option<(TrackId, TrackMode)> {
        let track = registry.track_at_mut(self.current?)?;
        track.mode = TrackMode::Disabled;
        Some((track.id.clone(), TrackMode::Disabled))
    }

    /// Routes the first showing track, if it differs from the current
    /// selection, through [`Self::select_by_menu_index`]
    pub fn sync_from_modes(&mut self, registry: &mut TrackRegistry, render_natively: bool) -> Transition {
        let showing = registry
            .listed()
            .position(|track| track.mode == TrackMode::Showing);
        if showing == self.current {
            return Transition::default();
        }
        self.select_by_menu_index(showing.map_or(0, |index| index + 1), registry, render_natively)
    }
}

fn set_mode(registry: &mut TrackRegistry, id: &str, mode: TrackMode, transition: &mut Transition) {
    if let Some(track) = registry.resolve_mut(id) {
        track.mode = mode;
        push_change(transition, (id.to_string(), mode));
    }
}

fn push_change(transition: &mut Transition, change: (TrackId, TrackMode)) {
    transition.modes.retain(|(id, _)| *id != change.0);
    transition.modes.push(change);
}
