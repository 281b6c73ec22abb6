#![forbid(unsafe_code)]

//! Incremental server-sent-events decoder.
//!
//! Converts the byte stream of a push endpoint into [`SseItem`]s. Input may be
//! split at arbitrary byte boundaries; partial lines are buffered until their
//! terminator arrives.
//!
//! Handled fields: `event`, `data` (multiple lines joined with `\n`), `id`
//! and `retry`. Lines starting with `:` are comments (keep-alives). An event
//! is dispatched on a blank line and only if at least one `data` line was
//! seen.
//!
//! A line longer than the decoder's limit ([`MAX_LINE_LEN`] by default)
//! abandons the event it belongs to; decoding resumes after the next newline.

use std::time::Duration;

use crate::event::RawEvent;

/// Default cap on a single buffered line, in bytes.
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Decoder output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseItem {
    /// A complete event.
    Event(RawEvent),
    /// Server-requested reconnection delay.
    Retry(Duration),
}

/// Streaming SSE decoder.
#[derive(Debug, Clone)]
pub struct SseDecoder {
    line: Vec<u8>,
    max_line: usize,
    skipping: bool,
    event_name: Option<String>,
    data: String,
    has_data: bool,
    last_event_id: Option<String>,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self {
            line: Vec::new(),
            max_line: MAX_LINE_LEN,
            skipping: false,
            event_name: None,
            data: String::new(),
            has_data: false,
            last_event_id: None,
        }
    }
}

impl SseDecoder {
    /// Create an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the longest line the decoder buffers.
    #[must_use]
    pub fn with_max_line(mut self, bytes: usize) -> Self {
        self.max_line = bytes.max(1);
        self
    }

    /// Id of the most recent event, for `Last-Event-ID` on reconnect.
    #[must_use]
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Feed a chunk, returning every item it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseItem> {
        let mut out = Vec::new();
        for &byte in chunk {
            if self.skipping {
                self.skipping = byte != b'\n';
                continue;
            }
            if byte == b'\n' {
                if self.line.last() == Some(&b'\r') {
                    self.line.pop();
                }
                let line = std::mem::take(&mut self.line);
                self.process_line(&line, &mut out);
            } else if self.line.len() >= self.max_line {
                #[cfg(feature = "tracing")]
                tracing::warn!(limit = self.max_line, "sse line too long, dropping event");
                self.reset_partial();
                self.skipping = true;
            } else {
                self.line.push(byte);
            }
        }
        out
    }

    /// Discard partial state after a dropped connection.
    ///
    /// The last event id survives so the reconnect can resume.
    pub fn reset_partial(&mut self) {
        self.line.clear();
        self.skipping = false;
        self.event_name = None;
        self.data.clear();
        self.has_data = false;
    }

    fn process_line(&mut self, line: &[u8], out: &mut Vec<SseItem>) {
        if line.is_empty() {
            self.dispatch(out);
            return;
        }
        if line[0] == b':' {
            return;
        }
        let text = String::from_utf8_lossy(line);
        let (field, value) = match text.find(':') {
            Some(pos) => {
                let value = &text[pos + 1..];
                (&text[..pos], value.strip_prefix(' ').unwrap_or(value))
            }
            None => (text.as_ref(), ""),
        };
        match field {
            "event" => self.event_name = Some(value.to_owned()),
            "data" => {
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_data = true;
            }
            "id" => {
                if !value.contains('\0') {
                    self.last_event_id = Some(value.to_owned());
                }
            }
            "retry" => {
                if let Ok(ms) = value.trim().parse::<u64>() {
                    out.push(SseItem::Retry(Duration::from_millis(ms)));
                }
            }
            _ => {}
        }
    }

    fn dispatch(&mut self, out: &mut Vec<SseItem>) {
        let name = self.event_name.take();
        if !self.has_data {
            self.data.clear();
            return;
        }
        self.has_data = false;
        let name = name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "message".to_owned());
        out.push(SseItem::Event(RawEvent {
            name,
            data: std::mem::take(&mut self.data),
            id: self.last_event_id.clone(),
        }));
    }
}
