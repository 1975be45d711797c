//! # Core Streaming Functionality
//!
//! Client-side decoding of OpenAI-style Server-Sent Events. Bytes arrive in
//! arbitrary transport chunks; they are split into lines, each `data:` line is
//! parsed as a chat-completion chunk, and the first choice's delta content is
//! accumulated and handed to the caller as soon as it is seen.
//!
//! ## Tolerance
//!
//! Malformed frames (invalid JSON, empty payloads) are skipped, never raised:
//! upstream servers emit keep-alives and partial frames. A stream that ends
//! without the `[DONE]` sentinel, even mid-line, ends normally with whatever
//! text was accumulated. That can hide a truncated response; the byte and
//! line counts in [`StreamingMetrics`] are the only hint left behind.

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde_json::Value;
use tracing::{debug, trace};

/// Prefix of event lines carrying a payload
pub const DATA_PREFIX: &str = "data:";

/// Payload that marks the end of the stream
pub const DONE_SENTINEL: &str = "[DONE]";

/// Classification of a single stream line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A non-empty incremental text token
    Token(String),
    /// The `[DONE]` sentinel
    Done,
    /// Not a data line, or a data line without a usable token
    Ignored,
    /// A data line whose payload is not valid JSON
    Malformed,
}

/// Classify one line of the event stream.
pub fn parse_frame(line: &str) -> Frame {
    let Some(payload) = line.trim().strip_prefix(DATA_PREFIX) else {
        return Frame::Ignored;
    };
    let payload = payload.trim();
    if payload == DONE_SENTINEL {
        return Frame::Done;
    }

    let chunk: Value = match serde_json::from_str(payload) {
        Ok(chunk) => chunk,
        Err(_) => return Frame::Malformed,
    };

    chunk
        .get("choices")
        .and_then(|choices| choices.as_array())
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("delta"))
        .and_then(|delta| delta.get("content"))
        .and_then(|content| content.as_str())
        .filter(|content| !content.is_empty())
        .map(|content| Frame::Token(content.to_string()))
        .unwrap_or(Frame::Ignored)
}

/// # Line Buffer
///
/// Reassembles lines from transport chunks. Bytes are only decoded once a full
/// line is available, so a multi-byte character split across two chunks
/// survives intact; invalid UTF-8 is replaced rather than rejected.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completed, without terminators.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.pending[start..].iter().position(|byte| *byte == b'\n') {
            let end = start + offset;
            lines.push(String::from_utf8_lossy(&self.pending[start..end]).into_owned());
            start = end + 1;
        }
        self.pending.drain(..start);
        lines
    }

    /// Flush the trailing partial line left when the input ends without a newline.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(line)
    }

    /// Number of buffered bytes not yet forming a complete line
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Streaming metrics collection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamingMetrics {
    pub total_chunks: usize,
    pub total_bytes: usize,
    pub total_lines: usize,
    pub tokens: usize,
    pub malformed_frames: usize,
    /// Whether the stream ended with the `[DONE]` sentinel
    pub saw_done: bool,
}

impl StreamingMetrics {
    /// Create new streaming metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a transport chunk being received
    pub fn record_chunk(&mut self, length: usize) {
        self.total_chunks += 1;
        self.total_bytes += length;
    }

    pub fn record_line(&mut self) {
        self.total_lines += 1;
    }

    pub fn record_token(&mut self) {
        self.tokens += 1;
    }

    pub fn record_malformed(&mut self) {
        self.malformed_frames += 1;
    }
}

/// Text and counters of a fully decoded stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedStream {
    pub text: String,
    pub metrics: StreamingMetrics,
}

impl DecodedStream {
    /// Output size in characters (Unicode scalar values, not bytes).
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// # Stream Decoder
///
/// Incremental decoder state. Feed it transport chunks; every token is passed
/// to `on_token` before the next line is looked at. After `[DONE]` further
/// input is ignored.
pub struct StreamDecoder<F> {
    lines: SseLineBuffer,
    text: String,
    metrics: StreamingMetrics,
    on_token: F,
    finished: bool,
}

impl<F: FnMut(&str)> StreamDecoder<F> {
    pub fn new(on_token: F) -> Self {
        Self {
            lines: SseLineBuffer::new(),
            text: String::new(),
            metrics: StreamingMetrics::new(),
            on_token,
            finished: false,
        }
    }

    /// Consume a chunk. Returns `true` once the `[DONE]` sentinel was seen.
    pub fn feed(&mut self, chunk: &[u8]) -> bool {
        if self.finished {
            return true;
        }
        self.metrics.record_chunk(chunk.len());
        for line in self.lines.push(chunk) {
            if self.apply_line(&line) {
                break;
            }
        }
        self.finished
    }

    /// End of input: flush a trailing partial line and return the result.
    pub fn finish(mut self) -> DecodedStream {
        if !self.finished {
            if let Some(line) = self.lines.finish() {
                self.apply_line(&line);
            }
        }
        debug!(
            chunks = self.metrics.total_chunks,
            bytes = self.metrics.total_bytes,
            lines = self.metrics.total_lines,
            tokens = self.metrics.tokens,
            malformed = self.metrics.malformed_frames,
            saw_done = self.metrics.saw_done,
            "Stream decoded"
        );
        DecodedStream {
            text: self.text,
            metrics: self.metrics,
        }
    }

    fn apply_line(&mut self, line: &str) -> bool {
        self.metrics.record_line();
        match parse_frame(line) {
            Frame::Token(token) => {
                self.metrics.record_token();
                (self.on_token)(&token);
                self.text.push_str(&token);
            }
            Frame::Done => {
                self.metrics.saw_done = true;
                self.finished = true;
            }
            Frame::Malformed => {
                self.metrics.record_malformed();
                trace!(line = %line, "Skipping malformed stream frame");
            }
            Frame::Ignored => {}
        }
        self.finished
    }
}

/// Drive `stream` until `[DONE]` or end of input, collecting the text.
///
/// Errors yielded by the stream itself (transport failures, timeouts) are
/// returned unchanged; decoding never fails on its own.
pub async fn decode_stream<S, E, F>(mut stream: S, on_token: F) -> Result<DecodedStream, E>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    F: FnMut(&str),
{
    let mut decoder = StreamDecoder::new(on_token);
    while let Some(chunk) = stream.next().await {
        if decoder.feed(&chunk?) {
            break;
        }
    }
    Ok(decoder.finish())
}
