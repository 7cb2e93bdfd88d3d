//! Live adapter for the `GenerationService` port over HTTP.

use futures::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::GenerationError;
use crate::ports::generation::{
    CostEstimate, CostFuture, GenerationRequest, GenerationService, StreamFuture,
};

/// Generation service reached over HTTP at a configurable base URL.
pub struct HttpGenerationService {
    client: Client,
    base_url: String,
}

impl HttpGenerationService {
    /// Creates a client for the service at `base_url` (e.g. `https://api.gitdiagram.com`).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { client: Client::new(), base_url: base_url.into() }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/generate/{path}", self.base_url.trim_end_matches('/'))
    }
}

/// Body of a `/generate/cost` reply. Exactly one field is set.
#[derive(Deserialize)]
struct CostResponse {
    cost: Option<String>,
    error: Option<String>,
}

impl GenerationService for HttpGenerationService {
    fn open_stream(&self, request: &GenerationRequest) -> StreamFuture<'_> {
        let url = self.endpoint("stream");
        let body = request.clone();

        Box::pin(async move {
            debug!(%url, username = %body.username, repo = %body.repo, "opening generation stream");
            let response = self
                .client
                .post(&url)
                .header(ACCEPT, "text/event-stream")
                .json(&body)
                .send()
                .await
                .map_err(|e| GenerationError::Transport(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(GenerationError::Status { status: status.as_u16() });
            }

            let stream = response.bytes_stream().map(|chunk| {
                chunk.map(|bytes| bytes.to_vec()).map_err(|e| GenerationError::Read(e.to_string()))
            });
            Ok(stream.boxed())
        })
    }

    fn estimate_cost(&self, request: &GenerationRequest) -> CostFuture<'_> {
        let url = self.endpoint("cost");
        let body = request.clone();

        Box::pin(async move {
            let response = self
                .client
                .post(&url)
                .json(&body)
                .send()
                .await
                .map_err(|e| GenerationError::Transport(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(GenerationError::Status { status: status.as_u16() });
            }

            let text = response.text().await.map_err(|e| GenerationError::Read(e.to_string()))?;
            let reply: CostResponse = serde_json::from_str(&text).map_err(|e| {
                GenerationError::Read(format!("Failed to parse cost response: {e}"))
            })?;
            match reply {
                CostResponse { error: Some(error), .. } => Err(GenerationError::Service(error)),
                CostResponse { cost: Some(cost), .. } => Ok(CostEstimate { cost }),
                CostResponse { cost: None, error: None } => Err(GenerationError::Service(
                    "Cost estimate missing from response".to_string(),
                )),
            }
        })
    }
}
