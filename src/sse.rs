//! Line framing for agent response streams.
//!
//! Upstream services mix three conventions in one body: Server-Sent-Events `data: ` lines,
//! `:` comment lines, and bare text lines.  This module turns raw bytes into complete lines
//! ([`LineBuffer`]), tags each line with its convention ([`classify_line`]), and decides what a
//! line contributes to the reply ([`interpret_line`]).  Nothing here performs I/O.

use serde_json::Value;

/// Prefix of an event-stream data line.
pub const DATA_PREFIX: &str = "data: ";

/// Prefix of an event-stream comment line.
pub const COMMENT_PREFIX: char = ':';

/// Payload that ends the stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Field of a structured payload that carries reply text.
pub const CONTENT_FIELD: &str = "content";

/////////////////////////////////////////// LineBuffer ///////////////////////////////////////////

/// Reassembles newline-delimited lines from arbitrarily split byte chunks.
///
/// After every [`push`](LineBuffer::push) the buffer holds only the trailing partial line and,
/// if a chunk ended inside a multi-byte character, the bytes of that character.  Splitting the
/// same bytes at different points yields the same lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    text: String,
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and returns every line it completed, in order, without terminators.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        self.decode_pending();

        let Some(last_newline) = self.text.rfind('\n') else {
            return Vec::new();
        };
        let partial = self.text.split_off(last_newline + 1);
        let mut complete = std::mem::replace(&mut self.text, partial);
        complete.pop();
        complete
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
            .collect()
    }

    /// The trailing partial line currently held.
    pub fn partial(&self) -> &str {
        &self.text
    }

    /// Returns true when no partial line or partial character is held.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.pending.is_empty()
    }

    /// Consumes the buffer, returning whatever unterminated text it still held.
    pub fn finish(mut self) -> Option<String> {
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            self.text.push_str(&String::from_utf8_lossy(&rest));
        }
        if self.text.is_empty() {
            None
        } else {
            Some(self.text)
        }
    }

    fn decode_pending(&mut self) {
        let mut consumed = 0;
        while consumed < self.pending.len() {
            match std::str::from_utf8(&self.pending[consumed..]) {
                Ok(text) => {
                    self.text.push_str(text);
                    consumed = self.pending.len();
                }
                Err(err) => {
                    let valid = consumed + err.valid_up_to();
                    self.text
                        .push_str(&String::from_utf8_lossy(&self.pending[consumed..valid]));
                    match err.error_len() {
                        Some(invalid) => {
                            self.text.push(char::REPLACEMENT_CHARACTER);
                            consumed = valid + invalid;
                        }
                        None => {
                            // Incomplete character; wait for the next chunk.
                            consumed = valid;
                            break;
                        }
                    }
                }
            }
        }
        self.pending.drain(..consumed);
    }
}

///////////////////////////////////////// Classification /////////////////////////////////////////

/// The framing convention a complete line follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SseLine<'a> {
    /// A `data: ` line; holds the payload after the prefix.
    Data(&'a str),
    /// A `:` comment or keep-alive line.
    Comment(&'a str),
    /// A non-blank line with no event-stream framing.
    PlainText(&'a str),
    /// An empty or whitespace-only line.
    Blank,
}

/// Tags a complete line with its framing convention.
pub fn classify_line(line: &str) -> SseLine<'_> {
    if let Some(payload) = line.strip_prefix(DATA_PREFIX) {
        SseLine::Data(payload)
    } else if line.trim().is_empty() {
        SseLine::Blank
    } else if let Some(comment) = line.strip_prefix(COMMENT_PREFIX) {
        SseLine::Comment(comment)
    } else {
        SseLine::PlainText(line)
    }
}

////////////////////////////////////////// Interpretation //////////////////////////////////////////

/// Where the text of an increment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncrementSource {
    /// The `content` field of a structured payload.
    Record,
    /// A data payload that was not a record with content, forwarded as text.
    RawPayload,
    /// A line without event-stream framing.
    PlainText,
}

/// One unit of reply text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Increment {
    /// The text to deliver.
    pub text: String,
    /// How the text was obtained.
    pub source: IncrementSource,
}

impl Increment {
    fn new(text: impl Into<String>, source: IncrementSource) -> Self {
        Self {
            text: text.into(),
            source,
        }
    }
}

/// What one complete line contributes to the exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineAction {
    /// Deliver an increment.
    Emit(Increment),
    /// The sentinel arrived; the exchange is complete.
    Done,
    /// Nothing to deliver.
    Skip,
}

/// Decides what a complete line contributes.
///
/// Malformed payloads never fail: a data payload that is not a JSON record with a `content`
/// field is delivered as raw text unless it is blank.
pub fn interpret_line(line: &str) -> LineAction {
    match classify_line(line) {
        SseLine::Data(payload) => interpret_payload(payload),
        SseLine::PlainText(text) => {
            LineAction::Emit(Increment::new(text, IncrementSource::PlainText))
        }
        SseLine::Comment(_) | SseLine::Blank => LineAction::Skip,
    }
}

fn interpret_payload(payload: &str) -> LineAction {
    if payload == DONE_SENTINEL {
        return LineAction::Done;
    }
    if let Ok(Value::Object(record)) = serde_json::from_str::<Value>(payload) {
        if let Some(content) = record.get(CONTENT_FIELD) {
            return match truthy_text(content) {
                Some(text) => LineAction::Emit(Increment::new(text, IncrementSource::Record)),
                None => LineAction::Skip,
            };
        }
    }
    if payload.trim().is_empty() {
        LineAction::Skip
    } else {
        LineAction::Emit(Increment::new(payload, IncrementSource::RawPayload))
    }
}

/// Text of a `content` value, or `None` when the value is falsy.
///
/// Strings are forwarded as they are; any other truthy value (`true`, a non-zero number, an
/// array, an object) is forwarded as its JSON text.
fn truthy_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if text.is_empty() => None,
        Value::String(text) => Some(text.clone()),
        Value::Null | Value::Bool(false) => None,
        Value::Number(number) if number.as_f64() == Some(0.0) => None,
        other => Some(other.to_string()),
    }
}
