//! Streaming event types and utilities

use std::pin::Pin;
use tokio_stream::Stream;

/// Events emitted while a reply is streamed from the runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyEvent {
    /// The runtime accepted the request and began replying
    Start,
    /// An incremental text fragment arrived
    Delta { delta: String },
    /// The reply completed; `text` is the full concatenated output
    Done { text: String },
    /// The stream failed
    Error { message: String },
}

impl ReplyEvent {
    /// Check if this is a terminal event (Done or Error)
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReplyEvent::Done { .. } | ReplyEvent::Error { .. })
    }
}

/// A stream of reply events
pub type ReplyStream = Pin<Box<dyn Stream<Item = ReplyEvent> + Send>>;

/// Accumulates delta fragments into the final reply text
#[derive(Debug, Default)]
pub struct ReplyBuilder {
    buffer: String,
}

impl ReplyBuilder {
    /// Create a new reply builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a streaming event, folding deltas into the buffer.
    /// A `Done` event replaces the buffer with the authoritative full text.
    pub fn process_event(&mut self, event: &ReplyEvent) {
        match event {
            ReplyEvent::Delta { delta } => self.buffer.push_str(delta),
            ReplyEvent::Done { text } => {
                self.buffer.clear();
                self.buffer.push_str(text);
            }
            _ => {}
        }
    }

    /// The text accumulated so far
    pub fn text(&self) -> &str {
        &self.buffer
    }

    /// Consume the builder, returning the accumulated text
    pub fn into_text(self) -> String {
        self.buffer
    }
}
