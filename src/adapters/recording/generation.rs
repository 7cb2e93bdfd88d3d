//! Recording adapter for the `GenerationService` port.

use std::sync::{Arc, Mutex};

use futures::StreamExt;

use super::record_result;
use crate::cassette::format::{RecordedStream, ESTIMATE_COST, GENERATION_PORT, OPEN_STREAM};
use crate::cassette::recorder::CassetteRecorder;
use crate::error::GenerationError;
use crate::ports::generation::{CostFuture, GenerationRequest, GenerationService, StreamFuture};

const REDACTED: &str = "<redacted>";

/// Records stream bodies and cost estimates while delegating to an inner service.
pub struct RecordingGenerationService {
    inner: Arc<dyn GenerationService>,
    recorder: Arc<Mutex<CassetteRecorder>>,
}

impl RecordingGenerationService {
    /// Wraps `inner`, writing interactions to `recorder`.
    pub fn new(inner: Arc<dyn GenerationService>, recorder: Arc<Mutex<CassetteRecorder>>) -> Self {
        Self { inner, recorder }
    }
}

/// Copy of the request that is safe to write to disk.
fn redacted(request: &GenerationRequest) -> GenerationRequest {
    let mut copy = request.clone();
    copy.api_key = copy.api_key.map(|_| REDACTED.to_string());
    copy.git_token = copy.git_token.map(|_| REDACTED.to_string());
    copy
}

/// Watches a body go by and records it once the body is dropped, so
/// aborted and superseded reads are captured too.
struct StreamTap {
    recorder: Arc<Mutex<CassetteRecorder>>,
    request: GenerationRequest,
    recorded: RecordedStream,
    partial: Vec<u8>,
}

impl StreamTap {
    fn observe(&mut self, item: &Result<Vec<u8>, GenerationError>) {
        match item {
            Ok(bytes) => {
                self.partial.extend_from_slice(bytes);
                // Keep an incomplete trailing character for the next chunk.
                let valid = match std::str::from_utf8(&self.partial) {
                    Ok(text) => text.len(),
                    Err(err) => err.valid_up_to(),
                };
                if valid > 0 {
                    let rest = self.partial.split_off(valid);
                    let text = String::from_utf8_lossy(&self.partial).into_owned();
                    self.recorded.chunks.push(text);
                    self.partial = rest;
                }
            }
            Err(err) => self.recorded.failure = Some(err.clone()),
        }
    }
}

impl Drop for StreamTap {
    fn drop(&mut self) {
        if !self.partial.is_empty() {
            let rest = std::mem::take(&mut self.partial);
            self.recorded.chunks.push(String::from_utf8_lossy(&rest).into_owned());
        }
        let result: Result<&RecordedStream, GenerationError> = Ok(&self.recorded);
        record_result(&self.recorder, GENERATION_PORT, OPEN_STREAM, &self.request, &result);
    }
}

impl GenerationService for RecordingGenerationService {
    fn open_stream(&self, request: &GenerationRequest) -> StreamFuture<'_> {
        let request = request.clone();
        Box::pin(async move {
            match self.inner.open_stream(&request).await {
                Ok(body) => {
                    let mut tap = StreamTap {
                        recorder: Arc::clone(&self.recorder),
                        request: redacted(&request),
                        recorded: RecordedStream::default(),
                        partial: Vec::new(),
                    };
                    Ok(body.inspect(move |item| tap.observe(item)).boxed())
                }
                Err(err) => {
                    let result: Result<RecordedStream, GenerationError> = Err(err.clone());
                    record_result(
                        &self.recorder,
                        GENERATION_PORT,
                        OPEN_STREAM,
                        &redacted(&request),
                        &result,
                    );
                    Err(err)
                }
            }
        })
    }

    fn estimate_cost(&self, request: &GenerationRequest) -> CostFuture<'_> {
        let request = request.clone();
        Box::pin(async move {
            let result = self.inner.estimate_cost(&request).await;
            record_result(&self.recorder, GENERATION_PORT, ESTIMATE_COST, &redacted(&request), &result);
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{ScriptedGenerationService, ScriptedStream};
    use crate::ports::generation::CostEstimate;
    use serde_json::json;

    fn recorder(name: &str) -> Arc<Mutex<CassetteRecorder>> {
        Arc::new(Mutex::new(CassetteRecorder::new(
            std::env::temp_dir().join(format!("gitdiagram_{name}.cassette.yaml")),
            "test",
            "http://localhost",
        )))
    }

    #[tokio::test]
    async fn records_body_when_stream_is_dropped() {
        let inner = Arc::new(ScriptedGenerationService::new());
        let cafe = "data: {\"chunk\":\"café\"}\n".as_bytes();
        let (head, tail) = cafe.split_at(cafe.len() - 4);
        inner.push_stream(ScriptedStream {
            chunks: vec![Ok(head.to_vec()), Ok(tail.to_vec())],
            ..ScriptedStream::default()
        });
        let recorder = recorder("recording_body");
        let service = RecordingGenerationService::new(inner, Arc::clone(&recorder));

        let request = GenerationRequest::new("github", "acme", "widgets", "openai")
            .with_api_key(Some("sk-secret".into()));
        let body: Vec<_> = service.open_stream(&request).await.unwrap().collect().await;
        assert_eq!(body.len(), 2);

        let guard = recorder.lock().unwrap();
        assert_eq!(guard.len(), 1);
        let cassette_yaml = {
            guard.save().unwrap();
            std::fs::read_to_string(guard.path()).unwrap()
        };
        assert!(!cassette_yaml.contains("sk-secret"));
        let cassette: crate::cassette::Cassette = serde_yaml::from_str(&cassette_yaml).unwrap();
        let output = &cassette.interactions[0].output;
        let chunks: Vec<String> = serde_json::from_value(output["Ok"]["chunks"].clone()).unwrap();
        assert_eq!(chunks.concat(), "data: {\"chunk\":\"café\"}\n");
        assert!(chunks.iter().all(|c| !c.contains('\u{FFFD}')));
        let _ = std::fs::remove_file(guard.path());
    }

    #[tokio::test]
    async fn records_cost_results_and_failures() {
        let inner = Arc::new(ScriptedGenerationService::new());
        inner.push_cost(Ok(CostEstimate { cost: "$0.02 USD".into() }));
        inner.push_stream(ScriptedStream::rejected(500));
        let recorder = recorder("recording_cost");
        let service = RecordingGenerationService::new(inner, Arc::clone(&recorder));
        let request = GenerationRequest::new("github", "acme", "widgets", "openai");

        assert!(service.estimate_cost(&request).await.is_ok());
        assert!(service.open_stream(&request).await.is_err());

        let guard = recorder.lock().unwrap();
        assert_eq!(guard.len(), 2);
        guard.save().unwrap();
        let cassette: crate::cassette::Cassette =
            serde_yaml::from_str(&std::fs::read_to_string(guard.path()).unwrap()).unwrap();
        assert_eq!(cassette.interactions[0].output, json!({"Ok": {"cost": "$0.02 USD"}}));
        assert_eq!(cassette.interactions[1].output, json!({"Err": {"Status": {"status": 500}}}));
        let _ = std::fs::remove_file(guard.path());
    }
}
