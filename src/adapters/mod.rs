//! Adapter implementations of the port traits.
//!
//! `live` talks to the real service and the local filesystem, `memory`
//! keeps everything in process for tests, and `recording` / `replaying`
//! capture and serve cassettes.

pub mod live;
pub mod memory;
pub mod recording;
pub mod replaying;
