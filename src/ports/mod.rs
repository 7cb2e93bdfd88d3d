//! Port traits defining external boundaries.
//!
//! Each trait represents a boundary between the application core and an
//! external system (time, the generation service, the diagram cache,
//! credential storage). Implementations live in `src/adapters/`.

pub mod cache;
pub mod clock;
pub mod generation;
pub mod store;

pub use cache::{CachedDiagram, DiagramCache};
pub use clock::Clock;
pub use generation::{
    ByteStream, CostEstimate, CostFuture, GenerationRequest, GenerationService, StreamFuture,
};
pub use store::KeyValueStore;
