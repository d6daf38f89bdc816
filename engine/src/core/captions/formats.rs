//! Caption Format Parsers
//!
//! Supports parsing captions from the segmented text formats:
//! - SRT (SubRip)
//! - VTT (WebVTT)
//!
//! Parsers emit format-neutral [`RawCue`] tuples with times in seconds.
//! A block whose text is missing is emitted with `text: None` so the cue
//! converter can drop it without failing the rest of the file.
//!
//! # Example
//!
//! ```rust,ignore
//! use captrack::core::captions::{parse_srt, convert_cues};
//!
//! let srt_content = std::fs::read_to_string("subtitles.srt")?;
//! let cues = convert_cues(parse_srt(&srt_content)?);
//! ```

use thiserror::Error;

use super::RawCue;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during caption parsing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Invalid timestamp format
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
    /// Invalid caption format
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
    /// Missing required data
    #[error("Missing data: {0}")]
    MissingData(String),
    /// Unexpected end of input
    #[error("Unexpected end of input")]
    UnexpectedEnd,
}

// =============================================================================
// Parser Seam
// =============================================================================

/// A format parser turning raw track content into cue tuples.
///
/// Parsers hold no state across calls.
pub trait CueParser: Send + Sync {
    fn parse(&self, content: &str) -> Result<Vec<RawCue>, ParseError>;
}

/// SubRip parser
#[derive(Clone, Copy, Debug, Default)]
pub struct SrtParser;

impl CueParser for SrtParser {
    fn parse(&self, content: &str) -> Result<Vec<RawCue>, ParseError> {
        parse_srt(content)
    }
}

/// WebVTT parser
#[derive(Clone, Copy, Debug, Default)]
pub struct VttParser;

impl CueParser for VttParser {
    fn parse(&self, content: &str) -> Result<Vec<RawCue>, ParseError> {
        parse_vtt(content)
    }
}

// =============================================================================
// SRT Format
// =============================================================================

/// Parses SRT (SubRip) format content into cue tuples
///
/// # SRT Format
///
/// ```text
/// 1
/// 00:00:01,000 --> 00:00:04,000
/// First caption text
///
/// 2
/// 00:00:05,500 --> 00:00:08,000
/// Second caption text
/// with multiple lines
/// ```
///
/// Sequence numbers are optional.
pub fn parse_srt(content: &str) -> Result<Vec<RawCue>, ParseError> {
    let content = content.trim_start_matches('\u{feff}');
    let mut cues = Vec::new();
    let mut lines = content.lines().peekable();

    loop {
        // Skip empty lines
        while lines.next_if(|l| l.trim().is_empty()).is_some() {}

        let Some(first_line) = lines.next() else {
            break;
        };

        let timestamp_line = if first_line.contains("-->") {
            first_line
        } else {
            lines.next().ok_or(ParseError::UnexpectedEnd)?
        };
        let (start_sec, end_sec) = parse_timestamp_line(timestamp_line)?;

        let text = collect_block_text(&mut lines, |line| line.trim_end().to_string());
        cues.push(RawCue {
            begin: Some(start_sec),
            end: Some(end_sec),
            text,
        });
    }

    Ok(cues)
}

// =============================================================================
// VTT Format
// =============================================================================

/// Parses WebVTT format content into cue tuples
///
/// # VTT Format
///
/// ```text
/// WEBVTT
///
/// 00:00:01.000 --> 00:00:04.000
/// First caption text
///
/// 00:00:05.500 --> 00:00:08.000
/// Second caption text
/// ```
///
/// `NOTE`, `STYLE` and `REGION` blocks are skipped.
pub fn parse_vtt(content: &str) -> Result<Vec<RawCue>, ParseError> {
    let content = content.trim_start_matches('\u{feff}').trim_start();
    let mut cues = Vec::new();
    let mut lines = content.lines().peekable();

    match lines.next() {
        Some(first_line) if first_line.starts_with("WEBVTT") => {}
        _ => {
            return Err(ParseError::InvalidFormat(
                "VTT file must start with WEBVTT".to_string(),
            ))
        }
    }

    // Skip any header metadata (lines before first blank line after WEBVTT)
    while lines.next_if(|l| !l.trim().is_empty()).is_some() {}

    loop {
        while lines.next_if(|l| l.trim().is_empty()).is_some() {}

        let Some(first_line) = lines.next() else {
            break;
        };

        if is_vtt_non_cue_block(first_line) {
            while lines.next_if(|l| !l.trim().is_empty()).is_some() {}
            continue;
        }

        let timestamp_line = if first_line.contains("-->") {
            first_line
        } else {
            // This was a cue identifier, next line should be timestamp
            lines.next().ok_or(ParseError::UnexpectedEnd)?
        };
        let (start_sec, end_sec) = parse_timestamp_line(timestamp_line)?;

        let text = collect_block_text(&mut lines, |line| decode_entities(&strip_vtt_tags(line)));
        cues.push(RawCue {
            begin: Some(start_sec),
            end: Some(end_sec),
            text,
        });
    }

    Ok(cues)
}

fn is_vtt_non_cue_block(line: &str) -> bool {
    ["NOTE", "STYLE", "REGION"].iter().any(|keyword| {
        line.strip_prefix(keyword)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with([' ', '\t']))
    })
}

// =============================================================================
// Shared Helpers
// =============================================================================

/// Collects the text lines of a block up to the next blank line
fn collect_block_text<'a, I>(
    lines: &mut std::iter::Peekable<I>,
    clean: impl Fn(&str) -> String,
) -> Option<String>
where
    I: Iterator<Item = &'a str>,
{
    let mut text_lines = Vec::new();
    while let Some(line) = lines.next_if(|l| !l.trim().is_empty()) {
        text_lines.push(clean(line));
    }

    if text_lines.is_empty() {
        None
    } else {
        Some(text_lines.join("\n"))
    }
}

/// Parses a timestamp line (e.g., "00:00:01.000 --> 00:00:04.000 align:start")
fn parse_timestamp_line(line: &str) -> Result<(f64, f64), ParseError> {
    let parts: Vec<&str> = line.split("-->").collect();
    if parts.len() != 2 {
        return Err(ParseError::InvalidFormat(format!(
            "Expected 'start --> end' format: {}",
            line
        )));
    }

    // Handle optional cue settings after end timestamp
    let start_str = parts[0].trim();
    let end_part = parts[1].trim();
    let end_str = end_part.split_whitespace().next().unwrap_or(end_part);

    let start = parse_clock_timestamp(start_str)?;
    let end = parse_clock_timestamp(end_str)?;

    Ok((start, end))
}

/// Parses a clock timestamp into seconds.
///
/// Accepts `HH:MM:SS.mmm`, `MM:SS.mmm` and the SRT comma separator.
fn parse_clock_timestamp(ts: &str) -> Result<f64, ParseError> {
    let normalized = ts.replace(',', ".");
    let parts: Vec<&str> = normalized.split(':').collect();
    let invalid = || ParseError::InvalidTimestamp(ts.to_string());

    let component = |value: &str| -> Result<f64, ParseError> {
        let value = value.trim();
        if value.starts_with(['-', '+']) {
            return Err(invalid());
        }
        let parsed: f64 = value.parse().map_err(|_| invalid())?;
        if parsed.is_finite() && parsed >= 0.0 {
            Ok(parsed)
        } else {
            Err(invalid())
        }
    };

    match parts.as_slice() {
        [minutes, seconds] => Ok(component(minutes)? * 60.0 + component(seconds)?),
        [hours, minutes, seconds] => {
            Ok(component(hours)? * 3600.0 + component(minutes)? * 60.0 + component(seconds)?)
        }
        _ => Err(invalid()),
    }
}

/// Strips VTT formatting tags from text
fn strip_vtt_tags(text: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;

    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(c),
            _ => {}
        }
    }

    result
}

/// Decodes the character references allowed in cue text
pub(crate) fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", "\u{a0}")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

// =============================================================================
// Tests
// =============================================================================
