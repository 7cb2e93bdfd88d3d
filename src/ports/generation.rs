//! Generation service port: the remote diagram-generation API.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;

/// Raw response body of a generation stream, chunk by chunk.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, GenerationError>>;

/// Boxed future returned by [`GenerationService::open_stream`].
pub type StreamFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ByteStream, GenerationError>> + Send + 'a>>;

/// Boxed future returned by [`GenerationService::estimate_cost`].
pub type CostFuture<'a> =
    Pin<Box<dyn Future<Output = Result<CostEstimate, GenerationError>> + Send + 'a>>;

/// Parameters of one generation (also used for cost estimates).
///
/// Serializes to the JSON body expected by `/generate/stream` and
/// `/generate/cost`; absent credentials are omitted from the body.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Source-hosting platform id (`github`, `gitlab`, `gitea`).
    pub platform: String,
    /// Repository owner.
    pub username: String,
    /// Repository name.
    pub repo: String,
    /// Free-text instructions for the model. Empty for a plain generation.
    #[serde(default)]
    pub instructions: String,
    /// The user's own AI provider key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Access token for private repositories.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_token: Option<String>,
    /// AI provider id (`openai`, `anthropic`, `deepseek`).
    pub ai_platform: String,
}

impl GenerationRequest {
    /// Creates a request with no instructions or credentials.
    pub fn new(
        platform: impl Into<String>,
        username: impl Into<String>,
        repo: impl Into<String>,
        ai_platform: impl Into<String>,
    ) -> Self {
        Self {
            platform: platform.into(),
            username: username.into(),
            repo: repo.into(),
            instructions: String::new(),
            api_key: None,
            git_token: None,
            ai_platform: ai_platform.into(),
        }
    }

    /// Sets the instructions.
    #[must_use]
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    /// Sets the AI provider key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    /// Sets the repository access token.
    #[must_use]
    pub fn with_git_token(mut self, git_token: Option<String>) -> Self {
        self.git_token = git_token;
        self
    }

    /// Checks that the repository coordinates are present.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::InvalidRequest`] naming the first empty field.
    pub fn validate(&self) -> Result<(), GenerationError> {
        for (field, value) in
            [("platform", &self.platform), ("username", &self.username), ("repo", &self.repo)]
        {
            if value.trim().is_empty() {
                return Err(GenerationError::InvalidRequest(format!("{field} must not be empty")));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for GenerationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |secret: &Option<String>| secret.as_ref().map(|_| "<redacted>");
        f.debug_struct("GenerationRequest")
            .field("platform", &self.platform)
            .field("username", &self.username)
            .field("repo", &self.repo)
            .field("instructions", &self.instructions)
            .field("api_key", &redact(&self.api_key))
            .field("git_token", &redact(&self.git_token))
            .field("ai_platform", &self.ai_platform)
            .finish()
    }
}

/// Estimated price of a generation, preformatted by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostEstimate {
    /// Display string such as `"$0.04 USD"`.
    pub cost: String,
}

/// The remote service that turns a repository into a diagram.
pub trait GenerationService: Send + Sync {
    /// Opens the event stream for a generation.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent or the service
    /// answers with a non-success status.
    fn open_stream(&self, request: &GenerationRequest) -> StreamFuture<'_>;

    /// Asks the service what a generation would cost.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Service`] when the service reports an
    /// error, or a transport error when the call itself fails.
    fn estimate_cost(&self, request: &GenerationRequest) -> CostFuture<'_>;
}
