//! Stream ingestion: wire events, SSE decoding, state folding and the
//! controller that drives one generation at a time.

pub mod controller;
pub mod decoder;
pub mod event;
pub mod state;

pub use controller::{ingest, Outcome, Snapshot, StreamController};
pub use decoder::{Frame, SseDecoder};
pub use event::{Buffer, StreamEvent, StreamStatus};
pub use state::{StreamState, Transition};
