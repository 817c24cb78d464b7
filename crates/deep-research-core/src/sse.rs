/// Line-oriented Server-Sent Events decoding.
///
/// The research stream only ever carries `data: <json>` lines separated by
/// blank lines, so decoding is split in two: [`LineDecoder`] turns arbitrary
/// transport chunks into complete lines, and [`classify_line`] decides whether
/// a single line is an event.
use thiserror::Error;

use crate::types::{StreamEvent, WireEvent};

/// Maximum carry-over size (4 MB). A stream that never sends a newline is
/// treated as broken instead of growing the buffer without bound.
pub const MAX_BUFFER_SIZE: usize = 4 * 1024 * 1024;

pub const SSE_DATA_PREFIX: &str = "data: ";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("SSE buffer exceeded maximum size of {limit} bytes")]
    BufferOverflow { limit: usize },
}

// ---------- LineDecoder ----------

pub struct LineDecoder {
    buffer: String,
    /// Trailing bytes of a UTF-8 sequence split across chunks.
    pending: Vec<u8>,
    limit: usize,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::with_limit(MAX_BUFFER_SIZE)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            buffer: String::new(),
            pending: Vec::new(),
            limit,
        }
    }

    /// Feed raw transport bytes and return every line completed by them.
    pub fn feed_bytes(&mut self, chunk: &[u8]) -> Result<Vec<String>, DecodeError> {
        let text = self.decode_utf8(chunk);
        self.feed(&text)
    }

    /// Feed a chunk of text and return every line it completes, in order.
    /// The final unterminated fragment stays buffered.
    pub fn feed(&mut self, chunk: &str) -> Result<Vec<String>, DecodeError> {
        self.buffer.push_str(chunk);

        let mut lines = Vec::new();
        if let Some(last_newline) = self.buffer.rfind('\n') {
            let rest = self.buffer.split_off(last_newline + 1);
            let complete = std::mem::replace(&mut self.buffer, rest);
            lines.extend(
                complete[..last_newline]
                    .split('\n')
                    .map(|line| line.to_string()),
            );
        }

        if self.buffer.len() > self.limit {
            self.buffer.clear();
            self.pending.clear();
            return Err(DecodeError::BufferOverflow { limit: self.limit });
        }

        Ok(lines)
    }

    /// Text received but not yet terminated by a newline.
    pub fn buffered(&self) -> &str {
        &self.buffer
    }

    /// End of stream. The unterminated fragment is never emitted as a line;
    /// it is handed back only so the caller can report what was dropped.
    pub fn finish(&mut self) -> Option<String> {
        self.pending.clear();
        let remaining = std::mem::take(&mut self.buffer);
        if remaining.is_empty() {
            None
        } else {
            Some(remaining)
        }
    }

    fn decode_utf8(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(chunk);

        let mut out = String::with_capacity(bytes.len());
        let mut rest = bytes.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, tail) = rest.split_at(e.valid_up_to());
                    // valid_up_to guarantees this prefix is UTF-8
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &tail[bad..];
                        }
                        None => {
                            self.pending = tail.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------- Event-line classification ----------

/// What a single trimmed line turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    Event(StreamEvent),
    /// Framing: blank lines, comments, `event:`/`id:` fields.
    Ignored,
    /// A `data:` line whose payload is not a valid event record.
    Malformed(String),
    /// A well-formed record with a `type` this client does not know.
    UnknownKind(String),
}

pub fn classify_line(line: &str) -> LineOutcome {
    let Some(json) = line.strip_prefix(SSE_DATA_PREFIX) else {
        return LineOutcome::Ignored;
    };

    match serde_json::from_str::<WireEvent>(json.trim()) {
        Ok(wire) => {
            let event_type = wire.event_type.clone();
            match wire.into_event() {
                Some(event) => LineOutcome::Event(event),
                None => LineOutcome::UnknownKind(event_type),
            }
        }
        Err(e) => LineOutcome::Malformed(e.to_string()),
    }
}

/// Parse one trimmed line into an event; anything else yields `None`.
pub fn parse_event_line(line: &str) -> Option<StreamEvent> {
    match classify_line(line) {
        LineOutcome::Event(event) => Some(event),
        _ => None,
    }
}
