//! Caption System Module
//!
//! Turns caption content from every supported source into canonical cues:
//! - Cue data models (Cue, CuePayload, MetadataFrame, RawCue)
//! - SRT, WebVTT and DFXP parsing
//! - Cue conversion and content-based format dispatch
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Caption Ingestion                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  models.rs     - Data structures (Cue, payloads, raw tuples)    │
//! │  formats.rs    - SRT/VTT parsing, parser trait                   │
//! │  dfxp.rs       - Timed-text markup parsing                       │
//! │  convert.rs    - Raw tuple -> canonical cue                      │
//! │  dispatch.rs   - Dialect detection and routing                   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use captrack::core::captions::{Dialect, FormatDispatcher};
//!
//! let ingested = FormatDispatcher::default().ingest(&content)?;
//! assert_eq!(ingested.dialect, Dialect::WebVtt);
//! ```

mod convert;
mod dfxp;
mod dispatch;
mod formats;
mod models;

// Re-export models
pub use models::{Cue, CuePayload, MetadataFrame, RawCue};

// Re-export parsing and conversion
pub use convert::{convert_cue, convert_cues};
pub use dfxp::{parse_dfxp, DfxpParser};
pub use dispatch::{markup_root, Dialect, FormatDispatcher, Ingested, WEBVTT_MARKER};
pub use formats::{parse_srt, parse_vtt, CueParser, ParseError, SrtParser, VttParser};
