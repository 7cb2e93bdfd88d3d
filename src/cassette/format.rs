//! Cassette data structures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;

/// Port name used for generation-service interactions.
pub const GENERATION_PORT: &str = "generation";

/// Method name for stream interactions.
pub const OPEN_STREAM: &str = "open_stream";

/// Method name for cost interactions.
pub const ESTIMATE_COST: &str = "estimate_cost";

/// A single recorded call to an external port.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Interaction {
    /// Sequence number (assigned automatically by the recorder).
    pub seq: u64,
    /// Port name (e.g. `"generation"`).
    pub port: String,
    /// Method invoked on the port.
    pub method: String,
    /// The request that was sent.
    pub input: serde_json::Value,
    /// The result, as `{"Ok": ...}` or `{"Err": ...}`.
    pub output: serde_json::Value,
}

/// A cassette containing an ordered transcript of interactions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cassette {
    /// Human-readable name for this cassette.
    pub name: String,
    /// When this cassette was recorded.
    pub recorded_at: DateTime<Utc>,
    /// Service the interactions were recorded against.
    pub base_url: String,
    /// Ordered list of interactions.
    pub interactions: Vec<Interaction>,
}

/// A stream body as it was received: the text of every chunk, plus the
/// error that broke the body off, if any.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordedStream {
    /// Body chunks in arrival order.
    pub chunks: Vec<String>,
    /// Read failure that ended the body early.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<GenerationError>,
}
