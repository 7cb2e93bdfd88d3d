//! Incremental decoder for `data:`-framed server-sent events.

use super::event::StreamEvent;

const DATA_PREFIX: &str = "data: ";

/// Output of decoding one `data:` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A well-formed event.
    Event(StreamEvent),
    /// A `data:` line whose payload did not parse.
    Malformed {
        /// Raw payload after the `data: ` marker.
        payload: String,
        /// Parser diagnostic.
        reason: String,
    },
}

/// Longest line the decoder buffers before giving up on it.
pub const MAX_LINE_BYTES: usize = 8 * 1024 * 1024;

/// Splits a byte stream into lines and decodes the `data:` ones.
///
/// Bytes are buffered until a newline arrives, so records split across
/// network chunks (including inside a multi-byte character) decode intact.
/// A line that grows past the limit is dropped up to its newline and
/// reported once as [`Frame::Malformed`].
#[derive(Debug)]
pub struct SseDecoder {
    pending: Vec<u8>,
    max_line: usize,
    discarding: bool,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }
}

impl SseDecoder {
    /// Creates an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty decoder that buffers at most `max_line` bytes per line.
    #[must_use]
    pub fn with_max_line(max_line: usize) -> Self {
        Self { pending: Vec::new(), max_line, discarding: false }
    }

    /// Feeds a chunk of bytes and returns the frames completed by it.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        let mut rest = bytes;
        while let Some(end) = rest.iter().position(|b| *b == b'\n') {
            self.append(&rest[..end], &mut frames);
            if !std::mem::take(&mut self.discarding) {
                frames.extend(decode_line(&self.pending));
            }
            self.pending.clear();
            rest = &rest[end + 1..];
        }
        self.append(rest, &mut frames);
        frames
    }

    /// Decodes whatever is left once the stream has ended.
    pub fn finish(&mut self) -> Option<Frame> {
        let rest = std::mem::take(&mut self.pending);
        if std::mem::take(&mut self.discarding) {
            return None;
        }
        decode_line(&rest)
    }

    fn append(&mut self, bytes: &[u8], frames: &mut Vec<Frame>) {
        if self.discarding {
            return;
        }
        if self.pending.len() + bytes.len() > self.max_line {
            let head = &self.pending[..self.pending.len().min(64)];
            frames.push(Frame::Malformed {
                payload: String::from_utf8_lossy(head).into_owned(),
                reason: format!("line longer than {} bytes dropped", self.max_line),
            });
            self.pending.clear();
            self.discarding = true;
            return;
        }
        self.pending.extend_from_slice(bytes);
    }
}

fn decode_line(raw: &[u8]) -> Option<Frame> {
    let text = String::from_utf8_lossy(raw);
    let line: &str = &text;
    let line = line.strip_suffix('\r').unwrap_or(line);
    let payload = line.strip_prefix(DATA_PREFIX)?;
    Some(match serde_json::from_str::<StreamEvent>(payload) {
        Ok(event) => Frame::Event(event),
        Err(err) => Frame::Malformed { payload: payload.to_string(), reason: err.to_string() },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::event::StreamStatus;

    fn events(frames: Vec<Frame>) -> Vec<StreamEvent> {
        frames
            .into_iter()
            .filter_map(|f| match f {
                Frame::Event(e) => Some(e),
                Frame::Malformed { .. } => None,
            })
            .collect()
    }

    #[test]
    fn decodes_records_and_skips_separators() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(
            b"data: {\"status\":\"started\"}\n\ndata: {\"status\":\"diagram_chunk\",\"chunk\":\"A\"}\n\n",
        );
        let decoded = events(frames);
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].status, Some(StreamStatus::Started));
        assert_eq!(decoded[1].chunk.as_deref(), Some("A"));
    }

    #[test]
    fn joins_records_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"status\":\"expl").is_empty());
        let frames = decoder.push(b"anation_chunk\",\"chunk\":\"hi\"}\n");
        assert_eq!(events(frames)[0].chunk.as_deref(), Some("hi"));
    }

    #[test]
    fn keeps_multibyte_characters_split_across_chunks() {
        let record = "data: {\"status\":\"explanation_chunk\",\"chunk\":\"仓库\"}\n".as_bytes();
        let (head, tail) = record.split_at(record.len() - 4);
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(head).is_empty());
        let frames = decoder.push(tail);
        assert_eq!(events(frames)[0].chunk.as_deref(), Some("仓库"));
    }

    #[test]
    fn reports_malformed_payloads_without_stopping() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"data: {not json}\ndata: {\"status\":\"mapping\"}\n");
        assert!(matches!(&frames[0], Frame::Malformed { payload, .. } if payload == "{not json}"));
        assert!(matches!(&frames[1], Frame::Event(e) if e.status == Some(StreamStatus::Mapping)));
    }

    #[test]
    fn strips_carriage_returns_and_ignores_other_fields() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b": keep-alive\r\nevent: update\r\ndata: {\"status\":\"diagram\"}\r\n");
        assert_eq!(frames.len(), 1);
        assert!(matches!(&frames[0], Frame::Event(e) if e.status == Some(StreamStatus::Diagram)));
    }

    #[test]
    fn finish_decodes_unterminated_last_line() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"status\":\"complete\",\"diagram\":\"D\"}").is_empty());
        let frame = decoder.finish();
        assert!(matches!(frame, Some(Frame::Event(e)) if e.diagram.as_deref() == Some("D")));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn overlong_line_is_dropped_and_decoding_resumes() {
        let mut decoder = SseDecoder::with_max_line(48);
        let first = decoder.push(b"data: {\"status\":\"diagram_chunk\",\"chunk\":\"");
        assert!(first.is_empty());
        let dropped = decoder.push(b"xxxxxxxxxxxxxxxxxxxxxxxx");
        assert!(matches!(&dropped[..], [Frame::Malformed { reason, .. }] if reason.contains("48 bytes")));
        assert!(decoder.push(b"yyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyy").is_empty());

        let frames = decoder.push(b"\"}\ndata: {\"status\":\"mapping\"}\n");
        assert_eq!(frames.len(), 1);
        assert!(matches!(&frames[0], Frame::Event(e) if e.status == Some(StreamStatus::Mapping)));
    }

    #[test]
    fn finish_drops_an_overlong_unterminated_line() {
        let mut decoder = SseDecoder::with_max_line(16);
        assert_eq!(decoder.push(b"data: {\"status\":\"complete\"}").len(), 1);
        assert_eq!(decoder.finish(), None);
    }
}
