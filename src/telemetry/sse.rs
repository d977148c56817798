//! Minimal Server-Sent-Events decoding
//!
//! [`LineBuffer`] turns arbitrary byte chunks into lines, [`SseParser`]
//! accumulates those lines into events.

use bytes::{Buf, BytesMut};

/// A completed event with its data lines joined by `\n`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Accumulator state machine. `event:` sets the pending name, `data:` appends
/// to the pending buffer, and a blank line terminates the event.
#[derive(Debug, Default)]
pub struct SseParser {
    event: Option<String>,
    data: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line (without its terminator). Returns an event when the line
    /// completes one that has both a name and data.
    pub fn feed_line(&mut self, line: &str) -> Option<SseEvent> {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line.is_empty() {
            return self.dispatch();
        }

        if let Some(name) = line.strip_prefix("event:") {
            self.event = Some(name.trim().to_string());
        } else if let Some(data) = line.strip_prefix("data:") {
            self.data.push(data.strip_prefix(' ').unwrap_or(data).to_string());
        }
        // Comments (": keepalive") and unknown fields fall through

        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        let data = std::mem::take(&mut self.data);

        match event {
            Some(event) if !data.is_empty() => Some(SseEvent {
                event,
                data: data.join("\n"),
            }),
            _ => None,
        }
    }
}

/// Splits a chunked byte stream on `\n`, holding back any partial line
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: BytesMut,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Next complete line, decoded lossily, without its `\n`
    pub fn next_line(&mut self) -> Option<String> {
        let pos = self.buf.iter().position(|&b| b == b'\n')?;
        let line = self.buf.split_to(pos);
        self.buf.advance(1);
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}
