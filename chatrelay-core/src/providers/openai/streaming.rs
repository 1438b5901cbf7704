//! Incremental decoding of OpenAI streaming responses
//!
//! The response body arrives as arbitrary byte chunks carrying newline-terminated
//! lines. Each line is blank, `data: <json delta envelope>`, or `data: [DONE]`.
//! `LineReader` reassembles lines across chunk boundaries and `StreamDecoder`
//! turns them into `StreamEvent`s, one read at a time.

use super::types::OpenAIStreamChunk;
use crate::error::RelayResult;
use bytes::Bytes;
use futures::{Stream, StreamExt};

/// Prefix carried by every event line
pub const DATA_PREFIX: &str = "data:";

/// Payload that terminates the stream
pub const DONE_MARKER: &str = "[DONE]";

/// One decoded line of the provider protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Incremental text from the first choice
    Fragment { text: String },
    /// The provider signalled the end of the completion
    Done,
    /// A non-blank line that is not a valid delta envelope
    Malformed { raw: String },
}

/// Decode a single line. Returns `None` for lines that carry no event:
/// blank lines, heartbeats with an empty `choices` list, and deltas without text.
pub fn decode_line(line: &str) -> Option<StreamEvent> {
    let line = line.trim_end_matches('\r');
    let payload = match line.strip_prefix(DATA_PREFIX) {
        Some(rest) => rest.strip_prefix(' ').unwrap_or(rest),
        None => line,
    };

    if payload.trim().is_empty() {
        return None;
    }
    if payload.trim_end() == DONE_MARKER {
        return Some(StreamEvent::Done);
    }

    match serde_json::from_str::<OpenAIStreamChunk>(payload) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|text| !text.is_empty())
            .map(|text| StreamEvent::Fragment { text }),
        Err(_) => Some(StreamEvent::Malformed {
            raw: payload.to_string(),
        }),
    }
}

/// Splits a byte stream into lines.
///
/// Lines end at `\n` (an optional preceding `\r` is removed). A trailing line
/// without a terminator is returned once the body ends. Bytes are only decoded
/// as UTF-8 at line boundaries, so multi-byte characters may span chunks.
pub struct LineReader<S> {
    body: S,
    buffer: Vec<u8>,
    /// Bytes of `buffer` already known to contain no newline
    scanned: usize,
    exhausted: bool,
}

impl<S> LineReader<S>
where
    S: Stream<Item = RelayResult<Bytes>> + Unpin,
{
    pub fn new(body: S) -> Self {
        Self {
            body,
            buffer: Vec::new(),
            scanned: 0,
            exhausted: false,
        }
    }

    /// Read the next line, suspending until one is complete.
    ///
    /// Returns `None` at end of body. A body read error is returned once and
    /// ends the sequence.
    pub async fn next_line(&mut self) -> Option<RelayResult<String>> {
        loop {
            if let Some(offset) = self.buffer[self.scanned..].iter().position(|b| *b == b'\n') {
                let end = self.scanned + offset;
                let mut line: Vec<u8> = self.buffer.drain(..=end).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                self.scanned = 0;
                return Some(Ok(String::from_utf8_lossy(&line).into_owned()));
            }
            self.scanned = self.buffer.len();

            if self.exhausted {
                if self.buffer.is_empty() {
                    return None;
                }
                let mut line = std::mem::take(&mut self.buffer);
                self.scanned = 0;
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                return Some(Ok(String::from_utf8_lossy(&line).into_owned()));
            }

            match self.body.next().await {
                Some(Ok(chunk)) => self.buffer.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    self.exhausted = true;
                    self.buffer.clear();
                    self.scanned = 0;
                    return Some(Err(e));
                }
                None => self.exhausted = true,
            }
        }
    }

    /// Consume and discard the rest of the body. Returns the number of bytes dropped.
    pub async fn drain(&mut self) -> usize {
        let mut dropped = std::mem::take(&mut self.buffer).len();
        self.scanned = 0;
        while !self.exhausted {
            match self.body.next().await {
                Some(Ok(chunk)) => dropped += chunk.len(),
                Some(Err(e)) => {
                    tracing::debug!("Error while draining upstream body: {}", e);
                    self.exhausted = true;
                }
                None => self.exhausted = true,
            }
        }
        dropped
    }
}

/// Lazy, finite, non-restartable sequence of stream events over a response body
pub struct StreamDecoder<S> {
    lines: LineReader<S>,
    done: bool,
}

impl<S> StreamDecoder<S>
where
    S: Stream<Item = RelayResult<Bytes>> + Unpin,
{
    pub fn new(body: S) -> Self {
        Self {
            lines: LineReader::new(body),
            done: false,
        }
    }

    /// Next event, or `None` after `Done` or at end of body
    pub async fn next_event(&mut self) -> Option<RelayResult<StreamEvent>> {
        if self.done {
            return None;
        }
        loop {
            let line = match self.lines.next_line().await? {
                Ok(line) => line,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };
            if let Some(event) = decode_line(&line) {
                if event == StreamEvent::Done {
                    self.done = true;
                }
                return Some(Ok(event));
            }
        }
    }

    /// Whether the termination marker has been seen
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Read the remainder of the body so the connection can be reused.
    /// Returns the number of bytes discarded.
    pub async fn drain(&mut self) -> usize {
        self.done = true;
        self.lines.drain().await
    }

    /// Adapt the decoder into a `Stream` of events
    pub fn into_stream(self) -> impl Stream<Item = RelayResult<StreamEvent>> {
        futures::stream::unfold(self, |mut decoder| async move {
            decoder.next_event().await.map(|event| (event, decoder))
        })
    }
}
