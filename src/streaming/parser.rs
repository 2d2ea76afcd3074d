//! Incremental event-stream decoder
//!
//! Turns the raw byte chunks of a `text/event-stream` body into the `data`
//! payloads of complete messages:
//! - Lines end with `\n` or `\r\n`; chunks may split anywhere
//! - A blank line dispatches the pending message
//! - Multiple `data:` lines in one message are joined with `\n`
//! - Comment lines (`:`) and other fields are ignored
//! - Buffer: 1MB maximum per message

use bytes::BytesMut;

use crate::errors::{QueryError, Result};

/// Maximum buffer size (1MB)
pub const MAX_BUFFER_SIZE: usize = 1_048_576;

/// Decoder states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    /// Reading lines of the current message
    Reading,

    /// Current message overflowed; skipping to the next blank line
    Discarding,
}

/// Incremental event-stream decoder
#[derive(Debug)]
pub struct SseDecoder {
    /// Bytes of the current, not yet terminated line
    buffer: BytesMut,

    /// `data` lines collected for the current message
    data_lines: Vec<String>,

    /// Bytes held in `data_lines`
    pending_bytes: usize,

    state: DecoderState,

    /// Maximum size of one message
    max_buffer_size: usize,
}

impl SseDecoder {
    /// Create new decoder with default settings
    pub fn new() -> Self {
        Self::with_capacity(MAX_BUFFER_SIZE)
    }

    /// Create decoder with custom message size limit
    pub fn with_capacity(max_buffer_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            data_lines: Vec::new(),
            pending_bytes: 0,
            state: DecoderState::Reading,
            max_buffer_size,
        }
    }

    /// Add bytes and return every message they complete, in order.
    ///
    /// Each oversized message shows up as one [`QueryError::MalformedEvent`]
    /// where it would have been; the decoder skips the rest of it and keeps
    /// going, so the caller can treat the error as a dropped frame.
    pub fn add_bytes(&mut self, bytes: &[u8]) -> Vec<Result<String>> {
        self.buffer.extend_from_slice(bytes);

        let mut frames = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line = self.buffer.split_to(pos + 1);
            let mut line = &line[..pos];
            if line.last() == Some(&b'\r') {
                line = &line[..line.len() - 1];
            }
            let line = String::from_utf8_lossy(line).into_owned();

            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }

        if self.state == DecoderState::Reading
            && self.pending_bytes + self.buffer.len() > self.max_buffer_size
        {
            self.buffer.clear();
            frames.push(self.overflow());
        } else if self.state == DecoderState::Discarding {
            // Partial line of a discarded message; nothing to keep
            self.buffer.clear();
        }

        frames
    }

    fn process_line(&mut self, line: &str) -> Option<Result<String>> {
        if line.is_empty() {
            let was_discarding = self.state == DecoderState::Discarding;
            self.state = DecoderState::Reading;
            if was_discarding {
                return None;
            }
            return self.dispatch().map(Ok);
        }

        if self.state == DecoderState::Discarding || line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        if field == "data" {
            self.pending_bytes += value.len();
            if self.pending_bytes > self.max_buffer_size {
                return Some(self.overflow());
            }
            self.data_lines.push(value.to_string());
        }

        None
    }

    /// Drop the current message and report it
    fn overflow(&mut self) -> Result<String> {
        self.discard();
        tracing::warn!(
            max = self.max_buffer_size,
            "dropped oversized event while decoding stream"
        );
        Err(QueryError::MalformedEvent(format!(
            "Event exceeds maximum size of {} bytes",
            self.max_buffer_size
        )))
    }

    fn dispatch(&mut self) -> Option<String> {
        if self.data_lines.is_empty() {
            return None;
        }
        let frame = self.data_lines.join("\n");
        self.data_lines.clear();
        self.pending_bytes = 0;
        Some(frame)
    }

    fn discard(&mut self) {
        self.data_lines.clear();
        self.pending_bytes = 0;
        self.state = DecoderState::Discarding;
    }

    /// Flush whatever message is pending when the body ends without a
    /// trailing blank line
    pub fn finish(&mut self) -> Option<Result<String>> {
        let mut dropped = None;
        if !self.buffer.is_empty() && self.state == DecoderState::Reading {
            let rest = self.buffer.split();
            let line = String::from_utf8_lossy(&rest).trim_end_matches('\r').to_string();
            dropped = self.process_line(&line);
        }
        self.buffer.clear();
        self.state = DecoderState::Reading;
        dropped.or_else(|| self.dispatch().map(Ok))
    }

    /// Bytes currently buffered
    pub fn buffer_size(&self) -> usize {
        self.buffer.len() + self.pending_bytes
    }

    /// Clear the buffer
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.data_lines.clear();
        self.pending_bytes = 0;
        self.state = DecoderState::Reading;
    }

    /// Check if nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty() && self.data_lines.is_empty()
    }
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new()
    }
}
