//! In-memory adapters for tests and offline wiring.

pub mod cache;
pub mod generation;
pub mod store;

pub use cache::MemoryDiagramCache;
pub use generation::{ScriptedGenerationService, ScriptedStream};
pub use store::MemoryStore;
