//! Captrack Core Type Definitions
//!
//! Defines fundamental types used throughout the engine.

// =============================================================================
// ID Types
// =============================================================================

/// Track identifier, unique within a session
pub type TrackId = String;

// =============================================================================
// Time Types
// =============================================================================

/// Time in seconds (floating point)
pub type TimeSec = f64;

/// Returns the first candidate that is present and non-empty
pub(crate) fn first_non_empty<'a, I>(candidates: I) -> Option<&'a str>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    candidates
        .into_iter()
        .flatten()
        .find(|value| !value.trim().is_empty())
}
