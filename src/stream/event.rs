//! Wire types for events pushed by the generation service.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Progress tag shared by [`StreamEvent`] and the local stream state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamStatus {
    /// No generation has been started yet. Local only.
    #[default]
    Idle,
    /// The service accepted the request.
    Started,
    /// The explanation prompt was sent to the model.
    ExplanationSent,
    /// The explanation is being produced.
    Explanation,
    /// A fragment of the explanation text.
    ExplanationChunk,
    /// The component-mapping prompt was sent to the model.
    MappingSent,
    /// The component mapping is being produced.
    Mapping,
    /// A fragment of the component mapping.
    MappingChunk,
    /// The diagram prompt was sent to the model.
    DiagramSent,
    /// The diagram is being produced.
    Diagram,
    /// A fragment of the Mermaid diagram source.
    DiagramChunk,
    /// Generation finished; the event carries the full artifacts.
    Complete,
    /// Generation failed.
    Error,
}

impl StreamStatus {
    /// Wire name of the status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Started => "started",
            Self::ExplanationSent => "explanation_sent",
            Self::Explanation => "explanation",
            Self::ExplanationChunk => "explanation_chunk",
            Self::MappingSent => "mapping_sent",
            Self::Mapping => "mapping",
            Self::MappingChunk => "mapping_chunk",
            Self::DiagramSent => "diagram_sent",
            Self::Diagram => "diagram",
            Self::DiagramChunk => "diagram_chunk",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }

    /// Returns `true` for `complete` and `error`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }

    /// The buffer a `*_chunk` status appends to.
    #[must_use]
    pub fn chunk_buffer(self) -> Option<Buffer> {
        match self {
            Self::ExplanationChunk => Some(Buffer::Explanation),
            Self::MappingChunk => Some(Buffer::Mapping),
            Self::DiagramChunk => Some(Buffer::Diagram),
            _ => None,
        }
    }
}

impl fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the three text artifacts accumulated during a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Buffer {
    /// Prose explanation of the repository architecture.
    Explanation,
    /// Mapping from diagram components to paths in the repository.
    Mapping,
    /// Mermaid diagram source.
    Diagram,
}

/// A single `data:` record sent by the generation service.
///
/// Error records may omit `status` entirely. Unknown fields (the service
/// adds `ai_platform` and `ai_model` to `complete`) are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEvent {
    /// Progress tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StreamStatus>,
    /// Human-readable progress message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Incremental text for `*_chunk` statuses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk: Option<String>,
    /// Full explanation, sent with `complete`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    /// Full component mapping, sent with `complete`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping: Option<String>,
    /// Full diagram, sent with `complete`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagram: Option<String>,
    /// Service-reported failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StreamEvent {
    /// A milestone event carrying only a status and a message.
    #[must_use]
    pub fn milestone(status: StreamStatus, message: impl Into<String>) -> Self {
        Self { status: Some(status), message: Some(message.into()), ..Self::default() }
    }

    /// A chunk event for the given buffer.
    #[must_use]
    pub fn chunk(buffer: Buffer, text: impl Into<String>) -> Self {
        let status = match buffer {
            Buffer::Explanation => StreamStatus::ExplanationChunk,
            Buffer::Mapping => StreamStatus::MappingChunk,
            Buffer::Diagram => StreamStatus::DiagramChunk,
        };
        Self { status: Some(status), chunk: Some(text.into()), ..Self::default() }
    }

    /// A `complete` event with the final artifacts.
    #[must_use]
    pub fn complete(explanation: impl Into<String>, diagram: impl Into<String>) -> Self {
        Self {
            status: Some(StreamStatus::Complete),
            explanation: Some(explanation.into()),
            diagram: Some(diagram.into()),
            ..Self::default()
        }
    }

    /// A bare `{"error": ...}` record.
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self { error: Some(error.into()), ..Self::default() }
    }

    /// The error message, if this record reports one. Empty strings do not count.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref().filter(|e| !e.is_empty())
    }

    /// Encodes the event as one SSE record, blank separator line included.
    ///
    /// # Errors
    ///
    /// Returns an error if the event cannot be serialized.
    pub fn to_sse(&self) -> Result<String, serde_json::Error> {
        Ok(format!("data: {}\n\n", serde_json::to_string(self)?))
    }
}
