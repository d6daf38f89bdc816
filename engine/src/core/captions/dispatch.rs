//! Format Dispatcher
//!
//! Detects the dialect of fetched track content by inspection and routes it
//! to the matching parser:
//! - markup whose root element is `tt` -> DFXP
//! - otherwise, content containing `WEBVTT` -> WebVTT
//! - anything else -> SRT

use serde::{Deserialize, Serialize};

use super::dfxp::DfxpParser;
use super::formats::{CueParser, ParseError, SrtParser, VttParser};
use super::{convert_cues, Cue};

/// Marker identifying WebVTT content
pub const WEBVTT_MARKER: &str = "WEBVTT";

/// Source dialect of a track file
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Dfxp,
    WebVtt,
    Srt,
}

/// Result of ingesting one track file
#[derive(Clone, Debug, PartialEq)]
pub struct Ingested {
    pub dialect: Dialect,
    pub cues: Vec<Cue>,
}

/// Routes track content to the parser for its dialect
pub struct FormatDispatcher {
    dfxp: Box<dyn CueParser>,
    vtt: Box<dyn CueParser>,
    srt: Box<dyn CueParser>,
}

impl Default for FormatDispatcher {
    fn default() -> Self {
        Self::with_parsers(Box::new(DfxpParser), Box::new(VttParser), Box::new(SrtParser))
    }
}

impl std::fmt::Debug for FormatDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatDispatcher").finish_non_exhaustive()
    }
}

impl FormatDispatcher {
    /// Creates a dispatcher with custom parsers per dialect
    pub fn with_parsers(
        dfxp: Box<dyn CueParser>,
        vtt: Box<dyn CueParser>,
        srt: Box<dyn CueParser>,
    ) -> Self {
        Self { dfxp, vtt, srt }
    }

    /// Determines the dialect of the content
    pub fn detect(content: &str) -> Dialect {
        if markup_root(content).is_some_and(|root| root == "tt") {
            Dialect::Dfxp
        } else if content.contains(WEBVTT_MARKER) {
            Dialect::WebVtt
        } else {
            Dialect::Srt
        }
    }

    /// Parses and converts the content into canonical cues
    pub fn ingest(&self, content: &str) -> Result<Ingested, ParseError> {
        let dialect = Self::detect(content);
        let parser = match dialect {
            Dialect::Dfxp => &self.dfxp,
            Dialect::WebVtt => &self.vtt,
            Dialect::Srt => &self.srt,
        };
        let cues = convert_cues(parser.parse(content)?);
        Ok(Ingested { dialect, cues })
    }
}

/// Returns the local name of the document's root element.
///
/// Skips the XML declaration, processing instructions, comments, doctype
/// and a wrapping `<xml>` element.
pub fn markup_root(content: &str) -> Option<&str> {
    let mut rest = content.trim_start_matches('\u{feff}');

    loop {
        rest = rest.trim_start();
        if !rest.starts_with('<') {
            return None;
        }

        let skip_to = if rest.starts_with("<?") {
            "?>"
        } else if rest.starts_with("<!--") {
            "-->"
        } else if rest.starts_with("<!") {
            ">"
        } else {
            let name_end = rest[1..]
                .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
                .map(|index| index + 1)?;
            let name = &rest[1..name_end];
            let local = name.rsplit(':').next().unwrap_or(name);
            if local != "xml" {
                return (!local.is_empty()).then_some(local);
            }
            ">"
        };

        let end = rest.find(skip_to)?;
        rest = &rest[end + skip_to.len()..];
    }
}
