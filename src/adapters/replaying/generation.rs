//! Replaying adapter for the `GenerationService` port.

use std::sync::{Mutex, PoisonError};

use futures::stream::{self, StreamExt};
use serde::de::DeserializeOwned;

use crate::cassette::format::{RecordedStream, ESTIMATE_COST, GENERATION_PORT, OPEN_STREAM};
use crate::cassette::replayer::CassetteReplayer;
use crate::error::GenerationError;
use crate::ports::generation::{
    CostEstimate, CostFuture, GenerationRequest, GenerationService, StreamFuture,
};

/// Serves recorded stream bodies and cost estimates from a cassette.
pub struct ReplayingGenerationService {
    replayer: Mutex<CassetteReplayer>,
}

impl ReplayingGenerationService {
    /// Creates a service backed by the given replayer.
    #[must_use]
    pub fn new(replayer: CassetteReplayer) -> Self {
        Self { replayer: Mutex::new(replayer) }
    }

    fn next_result<T: DeserializeOwned>(&self, method: &str) -> Result<T, GenerationError> {
        let output = self
            .replayer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .next_interaction(GENERATION_PORT, method)
            .map_err(GenerationError::Read)?
            .output;
        serde_json::from_value::<Result<T, GenerationError>>(output).unwrap_or_else(|e| {
            Err(GenerationError::Read(format!(
                "{GENERATION_PORT}::{method}: malformed cassette output: {e}"
            )))
        })
    }
}

impl GenerationService for ReplayingGenerationService {
    fn open_stream(&self, _request: &GenerationRequest) -> StreamFuture<'_> {
        let result = self.next_result::<RecordedStream>(OPEN_STREAM);
        Box::pin(async move {
            let recorded = result?;
            let mut chunks: Vec<Result<Vec<u8>, GenerationError>> =
                recorded.chunks.into_iter().map(|c| Ok(c.into_bytes())).collect();
            if let Some(failure) = recorded.failure {
                chunks.push(Err(failure));
            }
            Ok(stream::iter(chunks).boxed())
        })
    }

    fn estimate_cost(&self, _request: &GenerationRequest) -> CostFuture<'_> {
        let result = self.next_result::<CostEstimate>(ESTIMATE_COST);
        Box::pin(async move { result })
    }
}
