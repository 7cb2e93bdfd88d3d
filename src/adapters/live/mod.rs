//! Live adapters for real external interactions.

pub mod cache;
pub mod clock;
pub mod generation;
pub mod store;

pub use cache::FileDiagramCache;
pub use clock::LiveClock;
pub use generation::HttpGenerationService;
pub use store::FileStore;
