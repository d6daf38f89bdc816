//! DFXP / TTML Parser
//!
//! Extracts timed paragraphs from timed-text markup documents:
//!
//! ```text
//! <tt xmlns="http://www.w3.org/ns/ttml" ttp:frameRate="25">
//!   <body><div>
//!     <p begin="00:00:01.000" end="00:00:04.000">First line<br/>second line</p>
//!     <p begin="5s" dur="2s">Offset timing</p>
//!   </div></body>
//! </tt>
//! ```
//!
//! Supported time expressions: `HH:MM:SS(.fff)`, `HH:MM:SS:FF` (frames) and
//! offset times with `h`, `m`, `s`, `ms`, `f` or `t` (ticks) metrics.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::formats::{decode_entities, CueParser, ParseError};
use super::RawCue;

const DEFAULT_FRAME_RATE: f64 = 30.0;
const DEFAULT_TICK_RATE: f64 = 1.0;

static TT_OPEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<(?:[A-Za-z_][\w.-]*:)?tt\b([^>]*)>").expect("valid tt regex")
});

static PARAGRAPH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)<(?:[A-Za-z_][\w.-]*:)?p\b([^>]*?)(?:/>|>(.*?)</(?:[A-Za-z_][\w.-]*:)?p\s*>)",
    )
    .expect("valid paragraph regex")
});

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_][\w:.-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid attribute regex")
});

static LINE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<(?:[\w.-]+:)?br\s*/?>").expect("valid br regex"));

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

static CLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+):(\d{2}):(\d{2}(?:\.\d+)?)$").expect("valid clock regex")
});

static CLOCK_FRAMES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+):(\d{2}):(\d{2}):(\d+(?:\.\d+)?)$").expect("valid clock frames regex")
});

static OFFSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+(?:\.\d+)?)(h|ms|m|s|f|t)$").expect("valid offset regex")
});

/// Timed-text markup parser
#[derive(Clone, Copy, Debug, Default)]
pub struct DfxpParser;

impl CueParser for DfxpParser {
    fn parse(&self, content: &str) -> Result<Vec<RawCue>, ParseError> {
        parse_dfxp(content)
    }
}

/// Frame and tick rates declared on the document root
#[derive(Clone, Copy, Debug, PartialEq)]
struct TimingContext {
    frame_rate: f64,
    tick_rate: f64,
}

impl Default for TimingContext {
    fn default() -> Self {
        Self {
            frame_rate: DEFAULT_FRAME_RATE,
            tick_rate: DEFAULT_TICK_RATE,
        }
    }
}

impl TimingContext {
    fn from_document(content: &str) -> Self {
        let mut timing = Self::default();
        let Some(root) = TT_OPEN.captures(content) else {
            return timing;
        };
        let attributes = parse_attributes(root.get(1).map_or("", |m| m.as_str()));

        let positive = |name: &str| {
            attributes
                .get(name)
                .and_then(|value| value.trim().parse::<f64>().ok())
                .filter(|rate| rate.is_finite() && *rate > 0.0)
        };
        if let Some(rate) = positive("frameRate") {
            timing.frame_rate = rate;
        }
        if let Some(rate) = positive("tickRate") {
            timing.tick_rate = rate;
        }
        timing
    }
}

/// Parses a DFXP document into cue tuples
pub fn parse_dfxp(content: &str) -> Result<Vec<RawCue>, ParseError> {
    let timing = TimingContext::from_document(content);
    let mut cues = Vec::new();

    for captures in PARAGRAPH.captures_iter(content) {
        let attributes = parse_attributes(captures.get(1).map_or("", |m| m.as_str()));

        let begin = attributes
            .get("begin")
            .map(|value| parse_time_expression(value, timing))
            .transpose()?;
        let end = match (attributes.get("end"), attributes.get("dur"), begin) {
            (Some(end), _, _) => Some(parse_time_expression(end, timing)?),
            (None, Some(dur), Some(begin)) => Some(begin + parse_time_expression(dur, timing)?),
            _ => None,
        };
        let text = captures
            .get(2)
            .map(|m| paragraph_text(m.as_str()))
            .filter(|text| !text.is_empty());

        cues.push(RawCue { begin, end, text });
    }

    if cues.is_empty() {
        return Err(ParseError::MissingData(
            "DFXP document has no <p> elements".to_string(),
        ));
    }

    Ok(cues)
}

/// Collects attributes keyed by local name (`tts:color` -> `color`)
fn parse_attributes(source: &str) -> HashMap<String, String> {
    ATTRIBUTE
        .captures_iter(source)
        .filter_map(|captures| {
            let name = captures.get(1)?.as_str();
            let value = captures.get(2).or_else(|| captures.get(3))?.as_str();
            let local = name.rsplit(':').next().unwrap_or(name);
            Some((local.to_string(), value.to_string()))
        })
        .collect()
}

fn paragraph_text(markup: &str) -> String {
    let collapsed = WHITESPACE.replace_all(markup, " ");
    let with_breaks = LINE_BREAK.replace_all(&collapsed, "\n");
    let stripped = TAG.replace_all(&with_breaks, "");
    decode_entities(&stripped)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_time_expression(value: &str, timing: TimingContext) -> Result<f64, ParseError> {
    let value = value.trim();

    if let Some(captures) = CLOCK_FRAMES.captures(value) {
        let hours = capture_f64(&captures, 1, value)?;
        let minutes = capture_f64(&captures, 2, value)?;
        let seconds = capture_f64(&captures, 3, value)?;
        let frames = capture_f64(&captures, 4, value)?;
        return Ok(hours * 3600.0 + minutes * 60.0 + seconds + frames / timing.frame_rate);
    }

    if let Some(captures) = CLOCK.captures(value) {
        let hours = capture_f64(&captures, 1, value)?;
        let minutes = capture_f64(&captures, 2, value)?;
        let seconds = capture_f64(&captures, 3, value)?;
        return Ok(hours * 3600.0 + minutes * 60.0 + seconds);
    }

    if let Some(captures) = OFFSET.captures(value) {
        let count = capture_f64(&captures, 1, value)?;
        let seconds = match captures.get(2).map(|m| m.as_str()) {
            Some("h") => count * 3600.0,
            Some("m") => count * 60.0,
            Some("s") => count,
            Some("ms") => count / 1000.0,
            Some("f") => count / timing.frame_rate,
            Some("t") => count / timing.tick_rate,
            _ => return Err(ParseError::InvalidTimestamp(value.to_string())),
        };
        return Ok(seconds);
    }

    Err(ParseError::InvalidTimestamp(value.to_string()))
}

fn capture_f64(captures: &Captures<'_>, index: usize, source: &str) -> Result<f64, ParseError> {
    captures
        .get(index)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .ok_or_else(|| ParseError::InvalidTimestamp(source.to_string()))
}
