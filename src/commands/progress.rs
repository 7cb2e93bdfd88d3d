//! Terminal progress output for running generations.

use std::io::Write;

use crate::stream::{Buffer, StreamState, StreamStatus};

/// Prints one line per milestone and a running count of streamed text.
///
/// Repeated snapshots of the same milestone are printed once.
pub struct ProgressPrinter<W: Write> {
    out: W,
    last_status: Option<StreamStatus>,
    last_message: Option<String>,
}

impl<W: Write> ProgressPrinter<W> {
    /// Creates a printer writing to `out`.
    pub fn new(out: W) -> Self {
        Self { out, last_status: None, last_message: None }
    }

    /// Reports `state` if it differs from the last one reported.
    pub fn observe(&mut self, state: &StreamState) {
        if self.last_status == Some(state.status) && self.last_message == state.message {
            return;
        }
        self.last_status = Some(state.status);
        self.last_message.clone_from(&state.message);

        let streamed: usize = [Buffer::Explanation, Buffer::Mapping, Buffer::Diagram]
            .into_iter()
            .filter_map(|buffer| state.buffer(buffer))
            .map(str::len)
            .sum();
        let line = match (&state.message, state.status) {
            (_, StreamStatus::Error) => format!(
                "[error] {}",
                state.error.as_deref().unwrap_or(crate::stream::state::UNKNOWN_ERROR)
            ),
            (Some(message), status) => format!("[{status}] {message}"),
            (None, status) => format!("[{status}]"),
        };
        // Progress output is best effort.
        let _ = if streamed > 0 && !state.is_terminal() {
            writeln!(self.out, "{line} ({streamed} bytes received)")
        } else {
            writeln!(self.out, "{line}")
        };
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}
