//! Stream ingestion controller.
//!
//! [`StreamController::start`] spawns one read loop per generation. The
//! loop decodes the response body, folds events into a [`StreamState`]
//! and publishes snapshots on a `watch` channel. Publication happens under
//! the same lock that `start` and `cancel` take, and only while the loop's
//! request id is still current, so a superseded loop can never overwrite
//! newer state.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use futures::{FutureExt, Stream, StreamExt};
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use super::decoder::{Frame, SseDecoder};
use super::event::StreamStatus;
use super::state::{StreamState, Transition};
use crate::error::GenerationError;
use crate::ports::generation::{GenerationRequest, GenerationService};

/// Error shown when a read loop dies without reaching a terminal state.
pub const INTERRUPTED: &str = "Generation stopped unexpectedly";

/// Minimum spacing between snapshots that only grow a buffer.
pub const CHUNK_PUBLISH_INTERVAL: Duration = Duration::from_millis(50);

/// How a generation's read loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A `complete` event arrived.
    Complete,
    /// The service reported an error or the transport failed.
    Failed,
    /// The body ended without a terminal event.
    Stalled,
    /// [`StreamController::cancel`] stopped the read.
    Cancelled,
    /// A newer request replaced this one.
    Superseded,
}

/// What observers see: the state of the most recent request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Id returned by the `start` call that produced this state. `0` before any start.
    pub request_id: u64,
    /// Current progress and artifacts.
    pub state: StreamState,
    /// Set once the read loop has ended.
    pub outcome: Option<Outcome>,
}

impl Snapshot {
    fn idle() -> Self {
        Self { request_id: 0, state: StreamState::default(), outcome: None }
    }
}

struct Shared {
    current: u64,
    task: Option<AbortHandle>,
    updates: watch::Sender<Snapshot>,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drives generations against a [`GenerationService`] and exposes their progress.
pub struct StreamController {
    service: Arc<dyn GenerationService>,
    shared: Arc<Mutex<Shared>>,
}

impl StreamController {
    /// Creates a controller in the `idle` state.
    pub fn new(service: Arc<dyn GenerationService>) -> Self {
        let (updates, _) = watch::channel(Snapshot::idle());
        Self { service, shared: Arc::new(Mutex::new(Shared { current: 0, task: None, updates })) }
    }

    /// Subscribes to snapshots. The receiver starts at the current snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        lock(&self.shared).updates.subscribe()
    }

    /// Returns the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        lock(&self.shared).updates.borrow().clone()
    }

    /// Starts a generation, superseding any in-flight one.
    ///
    /// The state is reset to `started` and published before this returns;
    /// everything else arrives through [`StreamController::subscribe`].
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::InvalidRequest`] when the repository
    /// coordinates are empty. The current state is left untouched.
    pub fn start(&self, request: GenerationRequest) -> Result<u64, GenerationError> {
        request.validate()?;

        let mut shared = lock(&self.shared);
        if let Some(previous) = shared.task.take() {
            debug!(request_id = shared.current, "superseding in-flight generation");
            previous.abort();
        }
        shared.current += 1;
        let request_id = shared.current;
        shared.updates.send_replace(Snapshot {
            request_id,
            state: StreamState::started(),
            outcome: None,
        });

        let publisher = Publisher { shared: Arc::clone(&self.shared), request_id };
        let service = Arc::clone(&self.service);
        let handle = tokio::spawn(async move {
            let run = AssertUnwindSafe(run_request(service.as_ref(), &request, &publisher));
            if run.catch_unwind().await.is_err() {
                warn!(request_id, "generation read loop panicked");
                publisher.publish(&StreamState::failed(INTERRUPTED), Some(Outcome::Failed));
            }
        });
        shared.task = Some(handle.abort_handle());
        debug!(request_id, "generation started");
        Ok(request_id)
    }

    /// Stops the in-flight read, keeping the last published state.
    pub fn cancel(&self) {
        let mut shared = lock(&self.shared);
        if let Some(task) = shared.task.take() {
            task.abort();
        }
        let current = shared.current;
        shared.updates.send_if_modified(|snapshot| {
            if snapshot.request_id != current || snapshot.outcome.is_some() {
                return false;
            }
            snapshot.outcome = Some(Outcome::Cancelled);
            true
        });
    }

    /// Waits until the read loop of `request_id` has ended.
    ///
    /// Returns the final snapshot, or a snapshot with outcome
    /// [`Outcome::Superseded`] when a newer request replaced it first.
    pub async fn wait_for_end(&self, request_id: u64) -> Snapshot {
        let mut updates = self.subscribe();
        let ended = updates
            .wait_for(|s| s.request_id != request_id || s.outcome.is_some())
            .await
            .map(|snapshot| snapshot.clone());
        match ended {
            Ok(snapshot) if snapshot.request_id == request_id => snapshot,
            _ => Snapshot {
                request_id,
                state: StreamState::default(),
                outcome: Some(Outcome::Superseded),
            },
        }
    }
}

impl Drop for StreamController {
    fn drop(&mut self) {
        if let Some(task) = lock(&self.shared).task.take() {
            task.abort();
        }
    }
}

/// Publishes snapshots for one request while it is still current.
struct Publisher {
    shared: Arc<Mutex<Shared>>,
    request_id: u64,
}

impl Publisher {
    fn publish(&self, state: &StreamState, outcome: Option<Outcome>) -> bool {
        let shared = lock(&self.shared);
        if shared.current != self.request_id || shared.updates.borrow().outcome.is_some() {
            return false;
        }
        shared.updates.send_replace(Snapshot {
            request_id: self.request_id,
            state: state.clone(),
            outcome,
        });
        true
    }
}

/// Decides which progress states are worth a snapshot.
///
/// Status changes always are. Chunk appends leave the status alone and
/// are coalesced to one snapshot per [`CHUNK_PUBLISH_INTERVAL`]; the final
/// snapshot carries the whole state anyway.
#[derive(Debug, Default)]
struct PublishThrottle {
    last: Option<(StreamStatus, Instant)>,
}

impl PublishThrottle {
    fn due(&mut self, status: StreamStatus, now: Instant) -> bool {
        let due = match self.last {
            Some((last_status, at)) => {
                last_status != status || now.duration_since(at) >= CHUNK_PUBLISH_INTERVAL
            }
            None => true,
        };
        if due {
            self.last = Some((status, now));
        }
        due
    }
}

async fn run_request(
    service: &dyn GenerationService,
    request: &GenerationRequest,
    publisher: &Publisher,
) {
    let mut state = StreamState::started();
    let mut throttle = PublishThrottle::default();
    let outcome = match service.open_stream(request).await {
        Ok(stream) => {
            ingest(stream, &mut state, |s| {
                !throttle.due(s.status, Instant::now()) || publisher.publish(s, None)
            })
            .await
        }
        Err(err) => {
            warn!(error = %err, "failed to open generation stream");
            state = StreamState::failed(err.stream_message());
            Outcome::Failed
        }
    };
    if outcome != Outcome::Superseded {
        publisher.publish(&state, Some(outcome));
    }
}

/// Reads a response body to its end, folding events into `state`.
///
/// `on_update` is called after every state change; returning `false`
/// stops the read with [`Outcome::Superseded`]. The stream is consumed
/// and dropped on every return path.
pub async fn ingest<S, F>(stream: S, state: &mut StreamState, mut on_update: F) -> Outcome
where
    S: Stream<Item = Result<Vec<u8>, GenerationError>>,
    F: FnMut(&StreamState) -> bool,
{
    let mut stream = std::pin::pin!(stream);
    let mut decoder = SseDecoder::new();

    while let Some(chunk) = stream.next().await {
        let bytes = match chunk {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(error = %err, "generation stream broke off");
                *state = StreamState::failed(err.stream_message());
                on_update(state);
                return Outcome::Failed;
            }
        };
        for frame in decoder.push(&bytes) {
            if let Some(outcome) = apply_frame(frame, state, &mut on_update) {
                return outcome;
            }
        }
    }
    if let Some(frame) = decoder.finish() {
        if let Some(outcome) = apply_frame(frame, state, &mut on_update) {
            return outcome;
        }
    }

    warn!(status = %state.status, "generation stream ended before completion");
    Outcome::Stalled
}

fn apply_frame<F>(frame: Frame, state: &mut StreamState, on_update: &mut F) -> Option<Outcome>
where
    F: FnMut(&StreamState) -> bool,
{
    let event = match frame {
        Frame::Event(event) => event,
        Frame::Malformed { payload, reason } => {
            warn!(%reason, %payload, "skipping malformed stream event");
            return None;
        }
    };
    match state.apply(&event) {
        Transition::Unchanged => None,
        Transition::Progress => (!on_update(state)).then_some(Outcome::Superseded),
        Transition::Complete => {
            on_update(state);
            Some(Outcome::Complete)
        }
        Transition::Failed => {
            on_update(state);
            Some(Outcome::Failed)
        }
    }
}
