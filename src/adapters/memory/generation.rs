//! Scripted generation service that serves canned response bodies.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::stream::{self, StreamExt};

use crate::error::GenerationError;
use crate::ports::generation::{
    CostEstimate, CostFuture, GenerationRequest, GenerationService, StreamFuture,
};
use crate::stream::event::StreamEvent;

/// One canned response to `open_stream`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedStream {
    /// Body chunks, delivered in order. `Err` entries break the body off.
    pub chunks: Vec<Result<Vec<u8>, GenerationError>>,
    /// Keep the body open (pending forever) after the last chunk.
    pub hold_open: bool,
    /// Reject the request with this HTTP status instead of streaming.
    pub reject_status: Option<u16>,
}

impl ScriptedStream {
    /// One chunk per event, each encoded as an SSE record.
    ///
    /// An event that fails to serialize becomes a read failure in its place.
    #[must_use]
    pub fn from_events(events: &[StreamEvent]) -> Self {
        let chunks = events
            .iter()
            .map(|e| {
                e.to_sse()
                    .map(String::into_bytes)
                    .map_err(|err| GenerationError::Read(err.to_string()))
            })
            .collect();
        Self { chunks, ..Self::default() }
    }

    /// Raw text chunks, delivered verbatim.
    #[must_use]
    pub fn from_chunks(chunks: &[&str]) -> Self {
        Self { chunks: chunks.iter().map(|c| Ok(c.as_bytes().to_vec())).collect(), ..Self::default() }
    }

    /// A request the service refuses with `status`.
    #[must_use]
    pub fn rejected(status: u16) -> Self {
        Self { reject_status: Some(status), ..Self::default() }
    }

    /// Leaves the body open after the scripted chunks.
    #[must_use]
    pub fn held_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    /// Appends a read failure after the scripted chunks.
    #[must_use]
    pub fn broken_off(mut self, reason: impl Into<String>) -> Self {
        self.chunks.push(Err(GenerationError::Read(reason.into())));
        self
    }
}

/// Generation service that answers from queues of scripted responses.
///
/// Every request is remembered so tests can assert on what was sent.
#[derive(Debug, Default)]
pub struct ScriptedGenerationService {
    streams: Mutex<VecDeque<ScriptedStream>>,
    costs: Mutex<VecDeque<Result<CostEstimate, GenerationError>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedGenerationService {
    /// Creates a service with nothing scripted.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the response for the next `open_stream` call.
    pub fn push_stream(&self, stream: ScriptedStream) {
        lock(&self.streams).push_back(stream);
    }

    /// Queues the response for the next `estimate_cost` call.
    pub fn push_cost(&self, cost: Result<CostEstimate, GenerationError>) {
        lock(&self.costs).push_back(cost);
    }

    /// Requests received so far, in order, cost estimates included.
    #[must_use]
    pub fn requests(&self) -> Vec<GenerationRequest> {
        lock(&self.requests).clone()
    }
}

impl GenerationService for ScriptedGenerationService {
    fn open_stream(&self, request: &GenerationRequest) -> StreamFuture<'_> {
        lock(&self.requests).push(request.clone());
        let scripted = lock(&self.streams).pop_front();
        Box::pin(async move {
            let scripted = scripted.ok_or_else(|| {
                GenerationError::Transport("no scripted stream left".to_string())
            })?;
            if let Some(status) = scripted.reject_status {
                return Err(GenerationError::Status { status });
            }
            let body = stream::iter(scripted.chunks);
            if scripted.hold_open {
                Ok(body.chain(stream::pending()).boxed())
            } else {
                Ok(body.boxed())
            }
        })
    }

    fn estimate_cost(&self, request: &GenerationRequest) -> CostFuture<'_> {
        lock(&self.requests).push(request.clone());
        let scripted = lock(&self.costs).pop_front();
        Box::pin(async move {
            scripted.unwrap_or_else(|| {
                Err(GenerationError::Transport("no scripted cost estimate left".to_string()))
            })
        })
    }
}
