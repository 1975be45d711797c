//! # Streaming Module
//!
//! Consumes Server-Sent Events (SSE) from OpenAI-compatible chat-completion
//! endpoints, turning a chunked byte stream into accumulated response text.
//!
//! ## Key Features:
//! - Partial-line buffering across transport chunks
//! - Tolerant frame parsing (malformed frames are skipped)
//! - Live token callback for progress display

pub mod core;

pub use self::core::{
    decode_stream, parse_frame, DecodedStream, Frame, SseLineBuffer, StreamDecoder,
    StreamingMetrics, DATA_PREFIX, DONE_SENTINEL,
};
