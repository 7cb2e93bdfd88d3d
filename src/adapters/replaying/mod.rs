//! Replaying adapters that serve recorded interactions.

pub mod generation;

pub use generation::ReplayingGenerationService;
