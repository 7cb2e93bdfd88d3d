//! Local progress/result state folded from stream events.

use serde::Serialize;

use super::event::{Buffer, StreamEvent, StreamStatus};

/// Message shown as soon as a generation starts, before the service answers.
pub const STARTING_MESSAGE: &str = "Starting generation process...";

/// Fallback message for an `error` status that carries no text.
pub const UNKNOWN_ERROR: &str = "An unknown error occurred";

/// What applying one event did to the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The state changed and should be republished.
    Progress,
    /// Nothing changed (empty chunk, status-less record, or already terminal).
    Unchanged,
    /// The state became `complete`.
    Complete,
    /// The state became `error`.
    Failed,
}

/// Progress and artifacts of one generation.
///
/// Buffers only grow while streaming. Once `status` is `complete` or
/// `error`, [`StreamState::apply`] leaves the state untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamState {
    /// Latest status.
    pub status: StreamStatus,
    /// Latest progress message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Accumulated explanation text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    /// Accumulated component mapping.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapping: Option<String>,
    /// Accumulated diagram source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagram: Option<String>,
    /// Failure message once `status` is `error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StreamState {
    /// State published when a new generation begins.
    #[must_use]
    pub fn started() -> Self {
        Self {
            status: StreamStatus::Started,
            message: Some(STARTING_MESSAGE.to_string()),
            ..Self::default()
        }
    }

    /// Terminal error state.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self { status: StreamStatus::Error, error: Some(error.into()), ..Self::default() }
    }

    /// Returns `true` once the state is `complete` or `error`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Current contents of a buffer.
    #[must_use]
    pub fn buffer(&self, buffer: Buffer) -> Option<&str> {
        match buffer {
            Buffer::Explanation => self.explanation.as_deref(),
            Buffer::Mapping => self.mapping.as_deref(),
            Buffer::Diagram => self.diagram.as_deref(),
        }
    }

    fn buffer_mut(&mut self, buffer: Buffer) -> &mut Option<String> {
        match buffer {
            Buffer::Explanation => &mut self.explanation,
            Buffer::Mapping => &mut self.mapping,
            Buffer::Diagram => &mut self.diagram,
        }
    }

    /// Folds one event into the state.
    pub fn apply(&mut self, event: &StreamEvent) -> Transition {
        if self.is_terminal() {
            return Transition::Unchanged;
        }
        if let Some(error) = event.error_message() {
            *self = Self::failed(error);
            return Transition::Failed;
        }
        let Some(status) = event.status else {
            return Transition::Unchanged;
        };

        match status {
            StreamStatus::Idle => Transition::Unchanged,
            StreamStatus::Started
            | StreamStatus::ExplanationSent
            | StreamStatus::Explanation
            | StreamStatus::MappingSent
            | StreamStatus::Mapping
            | StreamStatus::DiagramSent
            | StreamStatus::Diagram => {
                self.status = status;
                self.message.clone_from(&event.message);
                Transition::Progress
            }
            StreamStatus::ExplanationChunk
            | StreamStatus::MappingChunk
            | StreamStatus::DiagramChunk => {
                let Some(chunk) = event.chunk.as_deref().filter(|c| !c.is_empty()) else {
                    return Transition::Unchanged;
                };
                let Some(buffer) = status.chunk_buffer() else {
                    return Transition::Unchanged;
                };
                self.buffer_mut(buffer).get_or_insert_with(String::new).push_str(chunk);
                Transition::Progress
            }
            // The completion record is authoritative over the buffers.
            StreamStatus::Complete => {
                *self = Self {
                    status: StreamStatus::Complete,
                    explanation: event.explanation.clone(),
                    diagram: event.diagram.clone(),
                    ..Self::default()
                };
                Transition::Complete
            }
            StreamStatus::Error => {
                *self = Self::failed(UNKNOWN_ERROR);
                Transition::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fold(events: &[StreamEvent]) -> StreamState {
        let mut state = StreamState::started();
        for event in events {
            state.apply(event);
        }
        state
    }

    #[test]
    fn chunks_concatenate_in_order() {
        let state = fold(&[
            StreamEvent::chunk(Buffer::Mapping, "a"),
            StreamEvent::chunk(Buffer::Mapping, "b"),
            StreamEvent::chunk(Buffer::Explanation, "x"),
            StreamEvent::chunk(Buffer::Mapping, "c"),
        ]);
        assert_eq!(state.mapping.as_deref(), Some("abc"));
        assert_eq!(state.explanation.as_deref(), Some("x"));
        assert_eq!(state.diagram, None);
        assert_eq!(state.status, StreamStatus::Started);
    }

    #[test]
    fn complete_replaces_buffers_with_event_fields() {
        let state = fold(&[
            StreamEvent::milestone(StreamStatus::Started, "go"),
            StreamEvent::chunk(Buffer::Explanation, "A"),
            StreamEvent::chunk(Buffer::Explanation, "B"),
            StreamEvent::complete("AB", "D"),
        ]);
        assert_eq!(
            state,
            StreamState {
                status: StreamStatus::Complete,
                explanation: Some("AB".into()),
                diagram: Some("D".into()),
                ..StreamState::default()
            }
        );
    }

    #[test]
    fn complete_does_not_append_to_buffered_content() {
        let state = fold(&[
            StreamEvent::chunk(Buffer::Diagram, "partial"),
            StreamEvent::chunk(Buffer::Mapping, "m"),
            StreamEvent::complete("final explanation", "final diagram"),
        ]);
        assert_eq!(state.diagram.as_deref(), Some("final diagram"));
        assert_eq!(state.mapping, None);
    }

    #[test]
    fn error_field_wins_over_status() {
        let mut state = StreamState::started();
        state.apply(&StreamEvent::chunk(Buffer::Diagram, "X"));
        let event = StreamEvent {
            status: Some(StreamStatus::DiagramChunk),
            chunk: Some("Y".into()),
            error: Some("invalid credential".into()),
            ..StreamEvent::default()
        };
        assert_eq!(state.apply(&event), Transition::Failed);
        assert_eq!(state, StreamState::failed("invalid credential"));
        assert_eq!(state.diagram, None);
    }

    #[test]
    fn terminal_state_ignores_later_events() {
        let mut state = fold(&[StreamEvent::failure("quota exceeded")]);
        assert_eq!(state.apply(&StreamEvent::chunk(Buffer::Diagram, "late")), Transition::Unchanged);
        assert_eq!(state.apply(&StreamEvent::complete("e", "d")), Transition::Unchanged);
        assert_eq!(state, StreamState::failed("quota exceeded"));
    }

    #[test]
    fn milestones_update_status_and_message_only() {
        let mut state = fold(&[StreamEvent::chunk(Buffer::Explanation, "text")]);
        let transition =
            state.apply(&StreamEvent::milestone(StreamStatus::MappingSent, "Sending mapping request"));
        assert_eq!(transition, Transition::Progress);
        assert_eq!(state.status, StreamStatus::MappingSent);
        assert_eq!(state.message.as_deref(), Some("Sending mapping request"));
        assert_eq!(state.explanation.as_deref(), Some("text"));

        state.apply(&StreamEvent { status: Some(StreamStatus::Mapping), ..StreamEvent::default() });
        assert_eq!(state.status, StreamStatus::Mapping);
        assert_eq!(state.message, None);
    }

    #[test]
    fn empty_or_missing_chunks_are_no_ops() {
        let mut state = StreamState::started();
        assert_eq!(state.apply(&StreamEvent::chunk(Buffer::Diagram, "")), Transition::Unchanged);
        let bare = StreamEvent { status: Some(StreamStatus::DiagramChunk), ..StreamEvent::default() };
        assert_eq!(state.apply(&bare), Transition::Unchanged);
        assert_eq!(state.diagram, None);
    }

    #[test]
    fn error_status_without_text_uses_fallback() {
        let mut state = StreamState::started();
        let event = StreamEvent { status: Some(StreamStatus::Error), ..StreamEvent::default() };
        assert_eq!(state.apply(&event), Transition::Failed);
        assert_eq!(state.error.as_deref(), Some(UNKNOWN_ERROR));
    }
}
