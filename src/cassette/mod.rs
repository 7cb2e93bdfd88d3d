//! Cassettes: YAML transcripts of generation-service interactions.
//!
//! A recording context writes every stream body and cost estimate it sees;
//! a replaying context serves them back in order, so a full generation can
//! be reproduced without network access.

pub mod format;
pub mod recorder;
pub mod replayer;

pub use format::{Cassette, Interaction, RecordedStream};
pub use recorder::CassetteRecorder;
pub use replayer::CassetteReplayer;
