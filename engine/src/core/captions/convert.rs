//! Cue Converter
//!
//! Turns format-neutral cue tuples into canonical [`Cue`]s. Tuples missing a
//! start, end or text, or whose timing is not a valid interval, are dropped.

use tracing::trace;

use super::{Cue, RawCue};

/// Converts a single tuple, returning `None` for incomplete or invalid input
pub fn convert_cue(raw: &RawCue) -> Option<Cue> {
    let (Some(begin), Some(end), Some(text)) = (raw.begin, raw.end, raw.text.as_deref()) else {
        return None;
    };
    if text.is_empty() {
        return None;
    }

    let cue = Cue::text(begin, end, text);
    cue.has_valid_timing().then_some(cue)
}

/// Converts a batch of tuples, preserving input order
pub fn convert_cues<I>(raws: I) -> Vec<Cue>
where
    I: IntoIterator<Item = RawCue>,
{
    let mut dropped = 0usize;
    let cues: Vec<Cue> = raws
        .into_iter()
        .filter_map(|raw| {
            let cue = convert_cue(&raw);
            if cue.is_none() {
                dropped += 1;
            }
            cue
        })
        .collect();

    if dropped > 0 {
        trace!(target: "captions", dropped, "Dropped invalid cue tuples");
    }
    cues
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_valid_cue() {
        let cue = convert_cue(&RawCue::new(1.0, 2.5, "Hello")).unwrap();
        assert_eq!(cue, Cue::text(1.0, 2.5, "Hello"));
    }

    #[test]
    fn test_convert_drops_partial_tuples() {
        let raws = vec![
            RawCue::new(0.0, 1.0, "first"),
            RawCue {
                begin: Some(1.0),
                end: None,
                text: Some("no end".to_string()),
            },
            RawCue {
                begin: Some(2.0),
                end: Some(3.0),
                text: None,
            },
            RawCue::new(3.0, 4.0, ""),
            RawCue::new(5.0, 4.0, "backwards"),
            RawCue::new(6.0, 7.0, "last"),
        ];

        let cues = convert_cues(raws);
        let texts: Vec<_> = cues.iter().filter_map(|c| c.payload.as_text()).collect();
        assert_eq!(texts, vec!["first", "last"]);
    }

    #[test]
    fn test_convert_accepts_zero_start() {
        assert!(convert_cue(&RawCue::new(0.0, 0.5, "zero")).is_some());
    }
}
