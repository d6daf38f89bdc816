//! Captrack Core Engine
//!
//! Caption track reconciliation engine.
//! Handles caption ingestion, track identity and selection, metadata
//! activation and engine settings.

pub mod captions;
pub mod settings;
pub mod tracks;

// Re-export common types
mod types;
pub use types::*;

mod error;
pub use error::*;

#[cfg(test)]
mod tests_lifecycle;
