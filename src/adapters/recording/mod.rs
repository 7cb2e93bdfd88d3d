//! Recording adapters that capture interactions to cassettes.

pub mod generation;

pub use generation::RecordingGenerationService;

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::warn;

use crate::cassette::recorder::CassetteRecorder;

/// Record a `Result<T, E>` interaction.
///
/// Results serialize with serde's external tagging, so the output is
/// `{"Ok": v}` or `{"Err": e}` and replays back into the same types.
pub(crate) fn record_result<I, T, E>(
    recorder: &Arc<Mutex<CassetteRecorder>>,
    port: &str,
    method: &str,
    input: &I,
    result: &Result<T, E>,
) where
    I: Serialize,
    T: Serialize,
    E: Serialize,
{
    let encoded = serde_json::to_value(input).and_then(|i| Ok((i, serde_json::to_value(result)?)));
    match encoded {
        Ok((input, output)) => {
            let mut guard = recorder.lock().unwrap_or_else(PoisonError::into_inner);
            guard.record(port, method, input, output);
        }
        Err(err) => warn!(%port, %method, error = %err, "failed to encode interaction for recording"),
    }
}
